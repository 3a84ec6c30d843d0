//! Listing queries.
//!
//! A [`Query`] is purely descriptive: it names a prefix and optional
//! delimiter, marker and limit. Backends only ever see the prefix; the
//! remaining filters are applied by [`Query::apply`] so every backend lists
//! with identical semantics.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{TypeError, TypeResult};
use crate::info::ObjectInfo;

/// Prefix/filter descriptor used to enumerate objects.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// Only names starting with this prefix match. Empty matches everything.
    pub prefix: String,
    /// When set, names containing the delimiter after the prefix are
    /// excluded from object listings and rolled up into folders.
    pub delimiter: Option<String>,
    /// Only names sorting strictly after this marker match.
    pub start_after: Option<String>,
    /// Maximum number of results.
    pub limit: Option<usize>,
}

impl Query {
    /// Query everything under `prefix`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Default::default()
        }
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    pub fn with_start_after(mut self, marker: impl Into<String>) -> Self {
        self.start_after = Some(marker.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Reject queries that cannot be answered meaningfully.
    pub fn validate(&self) -> TypeResult<()> {
        if self.limit == Some(0) {
            return Err(TypeError::InvalidQuery("limit must be greater than zero".into()));
        }
        if matches!(self.delimiter.as_deref(), Some("")) {
            return Err(TypeError::InvalidQuery("delimiter must not be empty".into()));
        }
        if matches!(self.start_after.as_deref(), Some("")) {
            return Err(TypeError::InvalidQuery("start_after marker must not be empty".into()));
        }
        Ok(())
    }

    /// Whether a single object name satisfies this query.
    pub fn matches(&self, name: &str) -> bool {
        let Some(rest) = name.strip_prefix(self.prefix.as_str()) else {
            return false;
        };
        if let Some(marker) = &self.start_after {
            if name <= marker.as_str() {
                return false;
            }
        }
        match &self.delimiter {
            Some(delimiter) => !rest.contains(delimiter.as_str()),
            None => true,
        }
    }

    /// Filter, sort ascending by name, and truncate to the limit.
    pub fn apply(&self, infos: impl IntoIterator<Item = ObjectInfo>) -> Vec<ObjectInfo> {
        let mut matched: Vec<ObjectInfo> = infos
            .into_iter()
            .filter(|info| self.matches(&info.name))
            .collect();
        matched.sort_by(|a, b| a.name.cmp(&b.name));
        matched.dedup_by(|a, b| a.name == b.name);
        if let Some(limit) = self.limit {
            matched.truncate(limit);
        }
        matched
    }

    /// Common prefixes one level below `prefix`, ending in the delimiter.
    ///
    /// Returns an empty list when no delimiter is set.
    pub fn folders<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let Some(delimiter) = self.delimiter.as_deref().filter(|d| !d.is_empty()) else {
            return Vec::new();
        };

        let mut folders = BTreeSet::new();
        for name in names {
            let Some(rest) = name.strip_prefix(self.prefix.as_str()) else {
                continue;
            };
            let Some(idx) = rest.find(delimiter) else {
                continue;
            };
            let folder = format!("{}{}", self.prefix, &rest[..idx + delimiter.len()]);
            if let Some(marker) = &self.start_after {
                if folder.as_str() <= marker.as_str() {
                    continue;
                }
            }
            folders.insert(folder);
        }

        let mut folders: Vec<String> = folders.into_iter().collect();
        if let Some(limit) = self.limit {
            folders.truncate(limit);
        }
        folders
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;

    fn info(name: &str) -> ObjectInfo {
        ObjectInfo::new(name, 0, Utc::now())
    }

    fn names(infos: &[ObjectInfo]) -> Vec<&str> {
        infos.iter().map(|i| i.name.as_str()).collect()
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    #[test]
    fn default_query_is_valid() {
        assert!(Query::default().validate().is_ok());
        assert!(Query::new("a/").with_delimiter("/").with_limit(3).validate().is_ok());
    }

    #[test]
    fn zero_limit_is_invalid() {
        let err = Query::new("").with_limit(0).validate().unwrap_err();
        assert!(matches!(err, TypeError::InvalidQuery(_)));
    }

    #[test]
    fn empty_delimiter_and_marker_are_invalid() {
        assert!(Query::new("").with_delimiter("").validate().is_err());
        assert!(Query::new("").with_start_after("").validate().is_err());
    }

    // -----------------------------------------------------------------------
    // Matching
    // -----------------------------------------------------------------------

    #[test]
    fn prefix_matching() {
        let q = Query::new("logs/");
        assert!(q.matches("logs/a"));
        assert!(q.matches("logs/2024/b"));
        assert!(!q.matches("log"));
        assert!(!q.matches("data/logs/a"));
    }

    #[test]
    fn delimiter_excludes_nested_names() {
        let q = Query::new("logs/").with_delimiter("/");
        assert!(q.matches("logs/a"));
        assert!(!q.matches("logs/2024/b"));
    }

    #[test]
    fn start_after_is_exclusive() {
        let q = Query::new("").with_start_after("b");
        assert!(!q.matches("a"));
        assert!(!q.matches("b"));
        assert!(q.matches("ba"));
        assert!(q.matches("c"));
    }

    // -----------------------------------------------------------------------
    // Apply / folders
    // -----------------------------------------------------------------------

    #[test]
    fn apply_sorts_and_limits() {
        let q = Query::new("x/").with_limit(2);
        let out = q.apply(vec![info("x/c"), info("y/a"), info("x/a"), info("x/b")]);
        assert_eq!(names(&out), vec!["x/a", "x/b"]);
    }

    #[test]
    fn folders_roll_up_one_level() {
        let q = Query::new("media/").with_delimiter("/");
        let folders = q.folders([
            "media/a.png",
            "media/2023/x.png",
            "media/2023/y.png",
            "media/2024/deep/z.png",
            "other/2023/q",
        ]);
        assert_eq!(folders, vec!["media/2023/", "media/2024/"]);
    }

    #[test]
    fn folders_without_delimiter_is_empty() {
        assert!(Query::new("").folders(["a/b", "c/d"]).is_empty());
    }

    proptest! {
        #[test]
        fn apply_output_is_sorted_and_prefixed(
            prefix in "[ab]{0,2}",
            raw in proptest::collection::vec("[abc/]{1,6}", 0..40),
        ) {
            let q = Query::new(prefix.clone());
            let out = q.apply(raw.iter().map(|n| info(n)));
            for pair in out.windows(2) {
                prop_assert!(pair[0].name < pair[1].name);
            }
            for item in &out {
                prop_assert!(item.name.starts_with(&prefix));
            }
            let expected = raw.iter().filter(|n| n.starts_with(&prefix)).collect::<BTreeSet<_>>().len();
            prop_assert_eq!(out.len(), expected);
        }
    }
}
