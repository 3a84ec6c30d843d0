mod common;

use std::sync::Arc;

use cloudstore::{CachedStore, ErrorKind, MetaData, Query, Store, StoreConfig};
use cloudstore_backend::LocalFsBackend;
use cloudstore_cache::CacheConfig;

fn store_at(remote: &std::path::Path, cache: &std::path::Path) -> CachedStore {
    common::init_tracing();
    let backend = LocalFsBackend::open(remote).unwrap();
    CachedStore::open(Arc::new(backend), StoreConfig::new(CacheConfig::new(cache))).unwrap()
}

#[test]
fn objects_persist_across_store_instances() {
    let dir = tempfile::tempdir().unwrap();
    let remote = dir.path().join("remote");

    {
        let store = store_at(&remote, &dir.path().join("cache-1"));
        let meta = MetaData::new().with(MetaData::CONTENT_TYPE_KEY, "application/json");
        store.write_object("cfg/app.json", &meta, br#"{"debug":true}"#).unwrap();
    }

    let store = store_at(&remote, &dir.path().join("cache-2"));
    let mut obj = store.get_and_open("cfg/app.json", true).unwrap();
    let mut body = String::new();
    std::io::Read::read_to_string(&mut obj, &mut body).unwrap();
    assert_eq!(body, r#"{"debug":true}"#);
    assert_eq!(obj.metadata().content_type(), Some("application/json"));
    assert!(obj.etag().is_some());
}

#[test]
fn nested_listing_and_folders() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_at(&dir.path().join("remote"), &dir.path().join("cache"));
    for name in ["logs/2024/jan.txt", "logs/2024/feb.txt", "logs/2025/jan.txt", "readme"] {
        store.write_object(name, &MetaData::new(), name.as_bytes()).unwrap();
    }

    let logs = store.list(&Query::new("logs/2024/")).unwrap();
    assert_eq!(logs.names(), vec!["logs/2024/feb.txt", "logs/2024/jan.txt"]);

    let years = store.folders(&Query::new("logs/").with_delimiter("/")).unwrap();
    assert_eq!(years, vec!["logs/2024/", "logs/2025/"]);

    let top = store.list(&Query::new("").with_delimiter("/")).unwrap();
    assert_eq!(top.names(), vec!["readme"]);
}

#[test]
fn edit_in_place_and_delete() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_at(&dir.path().join("remote"), &dir.path().join("cache"));
    store.write_object("notes/todo", &MetaData::new(), b"one\n").unwrap();

    let mut obj = store.get_and_open("notes/todo", false).unwrap();
    obj.seek(std::io::SeekFrom::End(0)).unwrap();
    obj.write_all(b"two\n").unwrap();
    obj.close().unwrap();
    obj.release().unwrap();

    let mut check = store.get_and_open("notes/todo", true).unwrap();
    let mut body = Vec::new();
    check.read_to_end(&mut body).unwrap();
    assert_eq!(body, b"one\ntwo\n");
    check.close().unwrap();
    check.release().unwrap();

    store.delete("notes/todo").unwrap();
    assert_eq!(store.get("notes/todo").unwrap_err().kind(), ErrorKind::NotFound);
    assert!(store.list(&Query::default()).unwrap().is_empty());
}

#[test]
fn escaping_names_are_rejected_by_backend() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_at(&dir.path().join("remote"), &dir.path().join("cache"));
    let err = store
        .write_object("../outside", &MetaData::new(), b"x")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(!dir.path().join("outside").exists());
}
