//! Version selection and the retention window.
//!
//! Pure functions over listed blob metadata; the store does the I/O.

use blobver_types::{BlobMeta, LogicalKey, VersionName};

use crate::types::VersionInfo;

/// Keep only the blobs that are versions of `key`, newest first.
///
/// The prefix listing for `a` also returns `a-b-…` blobs and anything else
/// that happens to share the prefix; those are dropped here.
pub fn versions_of(prefix: &str, key: &LogicalKey, listed: Vec<BlobMeta>) -> Vec<VersionInfo> {
    let mut versions: Vec<VersionInfo> = listed
        .into_iter()
        .filter_map(|blob| {
            VersionName::parse(prefix, key, &blob.pathname).map(|name| VersionInfo { name, blob })
        })
        .collect();
    versions.sort_by(VersionInfo::cmp_newest_first);
    versions
}

/// The current version: the newest one.
pub fn latest(versions: &[VersionInfo]) -> Option<&VersionInfo> {
    versions.iter().min_by(|a, b| a.cmp_newest_first(b))
}

/// Split newest-first `versions` into `(retained, expired)`.
///
/// The newest `retention` versions are retained. `pinned`, the version just
/// written, is retained even when clock skew sorts it outside the window.
pub fn split_for_retention(
    versions: Vec<VersionInfo>,
    retention: usize,
    pinned: Option<&str>,
) -> (Vec<VersionInfo>, Vec<VersionInfo>) {
    let mut retained = Vec::with_capacity(retention.min(versions.len()));
    let mut expired = Vec::new();
    for (position, version) in versions.into_iter().enumerate() {
        if position < retention || pinned == Some(version.pathname()) {
            retained.push(version);
        } else {
            expired.push(version);
        }
    }
    (retained, expired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use blobver_types::VersionStamp;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn key(s: &str) -> LogicalKey {
        LogicalKey::new(s).unwrap()
    }

    fn blob(pathname: &str, uploaded_ms: i64) -> BlobMeta {
        BlobMeta {
            pathname: pathname.into(),
            url: format!("memory://blobs/{pathname}"),
            size: 2,
            uploaded_at: Utc.timestamp_millis_opt(uploaded_ms).unwrap(),
        }
    }

    fn version(stamp: u64, uploaded_ms: i64) -> BlobMeta {
        let name = VersionName::new("p/", &key("k"), VersionStamp::from_millis(stamp));
        blob(name.pathname(), uploaded_ms)
    }

    fn names(versions: &[VersionInfo]) -> Vec<&str> {
        versions.iter().map(|v| v.pathname()).collect()
    }

    #[test]
    fn filters_siblings_and_strangers() {
        let listed = vec![
            blob("p/k-1.json", 1),
            blob("p/k-b-2.json", 2),
            blob("p/k-3.json.bak", 3),
            blob("p/k-.json", 4),
            blob("p/k-5.json", 5),
        ];
        let versions = versions_of("p/", &key("k"), listed);
        assert_eq!(names(&versions), ["p/k-5.json", "p/k-1.json"]);
    }

    #[test]
    fn orders_by_upload_time_not_name() {
        // Upload time decides, not the stamp in the name.
        let listed = vec![version(9, 100), version(10, 200), version(2, 300)];
        let versions = versions_of("p/", &key("k"), listed);
        assert_eq!(names(&versions), ["p/k-2.json", "p/k-10.json", "p/k-9.json"]);
        assert_eq!(latest(&versions).unwrap().pathname(), "p/k-2.json");
    }

    #[test]
    fn equal_upload_times_fall_back_to_stamp() {
        let listed = vec![version(41, 500), version(43, 500), version(42, 500)];
        let versions = versions_of("p/", &key("k"), listed);
        assert_eq!(names(&versions), ["p/k-43.json", "p/k-42.json", "p/k-41.json"]);
    }

    #[test]
    fn split_keeps_newest() {
        let listed = (1..=5).map(|i| version(i, i as i64)).collect();
        let (retained, expired) = split_for_retention(versions_of("p/", &key("k"), listed), 3, None);
        assert_eq!(names(&retained), ["p/k-5.json", "p/k-4.json", "p/k-3.json"]);
        assert_eq!(names(&expired), ["p/k-2.json", "p/k-1.json"]);
    }

    #[test]
    fn split_never_expires_the_pinned_version() {
        // The pinned version was uploaded with a skewed, older timestamp.
        let listed = vec![version(1, 10), version(2, 20), version(3, 30), version(4, 1)];
        let versions = versions_of("p/", &key("k"), listed);
        let (retained, expired) = split_for_retention(versions, 2, Some("p/k-4.json"));
        assert_eq!(names(&retained), ["p/k-3.json", "p/k-2.json", "p/k-4.json"]);
        assert_eq!(names(&expired), ["p/k-1.json"]);
    }

    #[test]
    fn empty_listing() {
        let versions = versions_of("p/", &key("k"), vec![]);
        assert!(latest(&versions).is_none());
        let (retained, expired) = split_for_retention(versions, 3, None);
        assert!(retained.is_empty() && expired.is_empty());
    }

    proptest! {
        #[test]
        fn window_is_bounded_and_partitions(
            stamps in proptest::collection::btree_set(1u64..10_000, 0..20),
            retention in 1usize..6,
        ) {
            let listed: Vec<BlobMeta> = stamps.iter().map(|&s| version(s, s as i64)).collect();
            let total = listed.len();
            let (retained, expired) = split_for_retention(versions_of("p/", &key("k"), listed), retention, None);

            prop_assert_eq!(retained.len(), total.min(retention));
            prop_assert_eq!(retained.len() + expired.len(), total);
            if let (Some(oldest_kept), Some(newest_expired)) = (retained.last(), expired.first()) {
                prop_assert!(oldest_kept.blob.uploaded_at > newest_expired.blob.uploaded_at);
            }
        }

        #[test]
        fn latest_ignores_list_order(
            stamps in proptest::collection::btree_set(1u64..10_000, 1..20),
            seed in any::<u64>(),
        ) {
            let mut listed: Vec<BlobMeta> = stamps.iter().map(|&s| version(s, (s % 7) as i64)).collect();
            let reference = latest(&versions_of("p/", &key("k"), listed.clone())).map(|v| v.pathname().to_string());
            let len = listed.len();
            listed.rotate_left((seed as usize) % len);
            listed.reverse();
            let shuffled = latest(&versions_of("p/", &key("k"), listed)).map(|v| v.pathname().to_string());
            prop_assert_eq!(reference, shuffled);
        }
    }
}
