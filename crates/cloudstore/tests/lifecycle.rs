mod common;

use cloudstore::{CacheState, ErrorKind, MetaData, Query, Store};
use common::Harness;

#[test]
fn write_then_read_back_with_metadata() {
    let h = Harness::new();
    let meta = MetaData::new().with(MetaData::CONTENT_TYPE_KEY, "text/plain");
    h.store.write_object("a/b.txt", &meta, b"hello").unwrap();

    let mut obj = h.store.get_and_open("a/b.txt", true).unwrap();
    let mut body = Vec::new();
    obj.read_to_end(&mut body).unwrap();
    assert_eq!(body, b"hello");
    assert_eq!(obj.metadata().content_type(), Some("text/plain"));
    assert_eq!(obj.size(), Some(5));

    obj.close().unwrap();
    obj.release().unwrap();
    assert!(h.cache_files().is_empty());
    assert_eq!(h.store.cache().live_entries(), 0);
}

#[test]
fn failed_sync_keeps_remote_and_dirty_state() {
    let h = Harness::new();
    h.store.write_object("doc", &MetaData::new(), b"old").unwrap();

    let mut obj = h.store.get_and_open("doc", false).unwrap();
    obj.set_len(0).unwrap();
    obj.write_all(b"new content").unwrap();

    h.backend.set_fail_put(true);
    assert_eq!(obj.sync().unwrap_err().kind(), ErrorKind::SyncFailed);
    assert!(obj.is_dirty());
    assert_eq!(h.backend.contents("doc").unwrap(), b"old");

    assert_eq!(obj.close().unwrap_err().kind(), ErrorKind::SyncFailed);
    assert_eq!(obj.state(), CacheState::OpenReadWrite);
    assert!(obj.is_dirty());
    assert_eq!(h.backend.contents("doc").unwrap(), b"old");

    h.backend.set_fail_put(false);
    obj.close().unwrap();
    assert_eq!(obj.state(), CacheState::Closed);
    assert!(!obj.is_dirty());
    assert_eq!(h.backend.contents("doc").unwrap(), b"new content");
}

#[test]
fn failed_open_leaves_nothing_behind() {
    let h = Harness::new();
    h.store.write_object("blob", &MetaData::new(), b"payload").unwrap();

    h.backend.set_fail_fetch(true);
    let err = h.store.get_and_open("blob", true).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
    assert_eq!(h.store.cache().live_entries(), 0);
    assert!(h.cache_files().is_empty());

    let mut obj = h.store.get("blob").unwrap();
    assert!(obj.open(false).is_err());
    assert_eq!(obj.state(), CacheState::Unopened);
    assert!(obj.cached_path().is_none());

    h.backend.set_fail_fetch(false);
    obj.open(true).unwrap();
    let mut body = Vec::new();
    obj.read_to_end(&mut body).unwrap();
    assert_eq!(body, b"payload");
}

#[test]
fn failed_write_object_keeps_previous_content() {
    let h = Harness::new();
    h.store.write_object("cfg", &MetaData::new(), b"v1").unwrap();

    h.backend.set_fail_put(true);
    let err = h
        .store
        .write_object("cfg", &MetaData::new(), b"v2")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SyncFailed);
    assert_eq!(h.backend.contents("cfg").unwrap(), b"v1");
    assert_eq!(h.store.cache().live_entries(), 0);
    assert!(h.cache_files().is_empty());
}

#[test]
fn delete_then_recreate() {
    let h = Harness::new();
    let v1 = MetaData::new().with("v", "1").with("old", "x");
    h.store.write_object("x", &v1, b"one").unwrap();
    h.store.delete("x").unwrap();
    assert_eq!(h.store.get("x").unwrap_err().kind(), ErrorKind::NotFound);

    let mut obj = h.store.new_object("x").unwrap();
    obj.set_metadata(MetaData::new().with("v", "2")).unwrap();
    obj.open(false).unwrap();
    obj.write_all(b"two").unwrap();
    obj.close().unwrap();
    obj.release().unwrap();

    let fetched = h.store.get("x").unwrap();
    assert_eq!(fetched.metadata(), &MetaData::new().with("v", "2"));
    drop(fetched);

    let mut reopened = h.store.get_and_open("x", true).unwrap();
    let mut body = Vec::new();
    reopened.read_to_end(&mut body).unwrap();
    assert_eq!(body, b"two");
    assert_eq!(reopened.metadata(), &MetaData::new().with("v", "2"));
}

#[test]
fn release_is_idempotent_and_drop_is_safe() {
    let h = Harness::new();
    h.store.write_object("r", &MetaData::new(), b"x").unwrap();

    let mut obj = h.store.get_and_open("r", true).unwrap();
    obj.close().unwrap();
    obj.release().unwrap();
    obj.release().unwrap();
    drop(obj);

    assert_eq!(h.store.cache().live_entries(), 0);
    let mut again = h.store.get_and_open("r", true).unwrap();
    again.close().unwrap();
}

#[test]
fn metadata_operations_never_download() {
    let h = Harness::new();
    for name in ["m/1", "m/2", "m/3"] {
        h.store.write_object(name, &MetaData::new(), b"data").unwrap();
    }

    let listed = h.store.list(&Query::new("m/")).unwrap();
    assert_eq!(listed.len(), 3);
    let _ = h.store.get("m/2").unwrap();
    let _ = h.store.folders(&Query::new("").with_delimiter("/")).unwrap();
    assert_eq!(h.backend.fetch_count(), 0);
}

#[test]
fn reopen_after_close_does_not_download_again() {
    let h = Harness::new();
    h.store.write_object("r", &MetaData::new(), b"x").unwrap();

    let mut obj = h.store.get_and_open("r", false).unwrap();
    obj.close().unwrap();
    obj.open(true).unwrap();
    obj.close().unwrap();
    assert_eq!(h.backend.fetch_count(), 1);
}

#[test]
fn clean_close_skips_push() {
    let h = Harness::new();
    h.store.write_object("c", &MetaData::new(), b"x").unwrap();
    let puts = h.backend.put_count();

    let mut obj = h.store.get_and_open("c", false).unwrap();
    obj.close().unwrap();
    assert_eq!(h.backend.put_count(), puts);

    obj.open(false).unwrap();
    obj.sync().unwrap();
    assert_eq!(h.backend.put_count(), puts + 1);
}

#[test]
fn size_limit_blocks_sync() {
    let h = Harness::with_config(|c| c.with_max_object_bytes(4));
    let mut obj = h.store.new_object("big").unwrap();
    obj.open(false).unwrap();
    obj.write_all(b"too large").unwrap();

    assert_eq!(obj.close().unwrap_err().kind(), ErrorKind::InvalidArgument);
    assert!(obj.is_dirty());
    assert!(h.backend.contents("big").is_none());

    obj.set_len(4).unwrap();
    obj.close().unwrap();
    assert_eq!(h.backend.contents("big").unwrap(), b"too ");
}

#[test]
fn cache_shutdown_invalidates_handles() {
    let h = Harness::new();
    h.store.write_object("s", &MetaData::new(), b"x").unwrap();

    let mut obj = h.store.get_and_open("s", true).unwrap();
    let path = obj.cached_path().unwrap().to_path_buf();
    obj.close().unwrap();

    assert_eq!(h.store.cache().shutdown().unwrap(), 1);
    assert!(!path.exists());
    assert_eq!(obj.state(), CacheState::Closed);
    assert!(obj.cached_path().is_none());

    assert_eq!(obj.open(true).unwrap_err().kind(), ErrorKind::Cache);
    obj.release().unwrap();
    assert_eq!(
        h.store.get_and_open("s", true).unwrap_err().kind(),
        ErrorKind::Cache
    );
}
