use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use blobver_types::BlobMeta;
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::object::{Freshness, PutOptions};
use crate::traits::ObjectStore;

/// An operation that can be made to fail on an [`InMemoryObjectStore`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Fault {
    Put,
    List,
    Fetch,
    Delete,
}

impl Fault {
    fn op(self) -> &'static str {
        match self {
            Self::Put => "put",
            Self::List => "list",
            Self::Fetch => "fetch",
            Self::Delete => "delete",
        }
    }
}

#[derive(Clone, Debug)]
struct StoredBlob {
    meta: BlobMeta,
    body: Bytes,
}

#[derive(Debug, Default)]
struct Blobs {
    by_pathname: BTreeMap<String, StoredBlob>,
    last_upload: Option<DateTime<Utc>>,
}

/// In-memory object store.
///
/// Intended for tests and embedding. Besides plain storage it models the two
/// behaviours of a remote blob service that the versioned layer has to cope
/// with:
///
/// - an edge cache keyed by URL that keeps answering [`Freshness::Cached`]
///   fetches with the bytes it first saw, even after an overwrite (deleting a
///   blob evicts its entry);
/// - injectable failures per operation (see [`Fault`]).
///
/// Upload timestamps are strictly increasing in insertion order, so ordering
/// by upload time is deterministic even for writes inside one millisecond.
pub struct InMemoryObjectStore {
    blobs: RwLock<Blobs>,
    edge_cache: RwLock<HashMap<String, Bytes>>,
    faults: RwLock<HashSet<Fault>>,
}

impl InMemoryObjectStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(Blobs::default()),
            edge_cache: RwLock::new(HashMap::new()),
            faults: RwLock::new(HashSet::new()),
        }
    }

    /// Number of blobs currently stored.
    pub fn len(&self) -> usize {
        self.blobs.read().expect("lock poisoned").by_pathname.len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bytes across all stored blobs.
    pub fn total_bytes(&self) -> u64 {
        self.blobs
            .read()
            .expect("lock poisoned")
            .by_pathname
            .values()
            .map(|b| b.meta.size)
            .sum()
    }

    /// Sorted pathnames of every stored blob.
    pub fn pathnames(&self) -> Vec<String> {
        self.blobs
            .read()
            .expect("lock poisoned")
            .by_pathname
            .keys()
            .cloned()
            .collect()
    }

    /// Remove all blobs and cached entries.
    pub fn clear(&self) {
        let mut blobs = self.blobs.write().expect("lock poisoned");
        blobs.by_pathname.clear();
        self.edge_cache.write().expect("lock poisoned").clear();
    }

    /// Make every subsequent call of `fault`'s operation fail until cleared.
    pub fn inject(&self, fault: Fault) {
        self.faults.write().expect("lock poisoned").insert(fault);
    }

    /// Stop failing `fault`'s operation.
    pub fn heal(&self, fault: Fault) {
        self.faults.write().expect("lock poisoned").remove(&fault);
    }

    /// Remove every injected fault.
    pub fn clear_faults(&self) {
        self.faults.write().expect("lock poisoned").clear();
    }

    /// Store a blob with an explicit upload time, bypassing the monotonic
    /// upload clock. Used to reproduce timestamp ties and clock skew.
    pub fn put_at(&self, pathname: &str, body: impl Into<Bytes>, uploaded_at: DateTime<Utc>) -> BlobMeta {
        let body = body.into();
        let meta = BlobMeta {
            pathname: pathname.to_string(),
            url: Self::url_for(pathname),
            size: body.len() as u64,
            uploaded_at,
        };
        let mut blobs = self.blobs.write().expect("lock poisoned");
        blobs.last_upload = blobs.last_upload.max(Some(uploaded_at));
        blobs.by_pathname.insert(
            pathname.to_string(),
            StoredBlob {
                meta: meta.clone(),
                body,
            },
        );
        meta
    }

    fn url_for(pathname: &str) -> String {
        format!("memory://blobs/{pathname}")
    }

    fn check(&self, fault: Fault) -> StoreResult<()> {
        if self.faults.read().expect("lock poisoned").contains(&fault) {
            debug!(op = fault.op(), "injected object store failure");
            return Err(StoreError::Injected(fault.op()));
        }
        Ok(())
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn put(&self, pathname: &str, body: Bytes, options: &PutOptions) -> StoreResult<BlobMeta> {
        self.check(Fault::Put)?;
        if pathname.is_empty() {
            return Err(StoreError::InvalidPathname {
                pathname: pathname.to_string(),
                reason: "pathname must not be empty".into(),
            });
        }

        let mut blobs = self.blobs.write().expect("lock poisoned");
        if !options.allow_overwrite && blobs.by_pathname.contains_key(pathname) {
            return Err(StoreError::AlreadyExists(pathname.to_string()));
        }

        // Strictly increasing upload times, one millisecond apart at minimum.
        let now = Utc::now();
        let uploaded_at = match blobs.last_upload {
            Some(last) if now <= last => last + Duration::milliseconds(1),
            _ => now,
        };
        blobs.last_upload = Some(uploaded_at);

        let meta = BlobMeta {
            pathname: pathname.to_string(),
            url: Self::url_for(pathname),
            size: body.len() as u64,
            uploaded_at,
        };
        blobs.by_pathname.insert(
            pathname.to_string(),
            StoredBlob {
                meta: meta.clone(),
                body,
            },
        );
        Ok(meta)
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<BlobMeta>> {
        self.check(Fault::List)?;
        let blobs = self.blobs.read().expect("lock poisoned");
        Ok(blobs
            .by_pathname
            .range(prefix.to_string()..)
            .take_while(|(name, _)| name.starts_with(prefix))
            .map(|(_, stored)| stored.meta.clone())
            .collect())
    }

    async fn fetch(&self, blob: &BlobMeta, freshness: Freshness) -> StoreResult<Bytes> {
        self.check(Fault::Fetch)?;

        if freshness == Freshness::Cached {
            if let Some(cached) = self.edge_cache.read().expect("lock poisoned").get(&blob.url) {
                return Ok(cached.clone());
            }
        }

        let body = {
            let blobs = self.blobs.read().expect("lock poisoned");
            blobs
                .by_pathname
                .get(&blob.pathname)
                .map(|stored| stored.body.clone())
                .ok_or_else(|| StoreError::NotFound(blob.pathname.clone()))?
        };
        self.edge_cache
            .write()
            .expect("lock poisoned")
            .insert(blob.url.clone(), body.clone());
        Ok(body)
    }

    async fn delete(&self, targets: &[BlobMeta]) -> StoreResult<()> {
        self.check(Fault::Delete)?;
        let mut blobs = self.blobs.write().expect("lock poisoned");
        let mut cache = self.edge_cache.write().expect("lock poisoned");
        for target in targets {
            blobs.by_pathname.remove(&target.pathname);
            cache.remove(&target.url);
        }
        debug!(count = targets.len(), "deleted blobs");
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("blob_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Core operations
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn put_and_fetch() {
        let store = InMemoryObjectStore::new();
        let meta = store.put("k-1.json", json("[1]"), &PutOptions::json()).await.unwrap();
        assert_eq!(meta.pathname, "k-1.json");
        assert_eq!(meta.size, 3);

        let body = store.fetch(&meta, Freshness::Revalidate).await.unwrap();
        assert_eq!(body, json("[1]"));
    }

    #[tokio::test]
    async fn put_without_overwrite_rejects_existing() {
        let store = InMemoryObjectStore::new();
        store.put("k-1.json", json("[]"), &PutOptions::json()).await.unwrap();
        let err = store.put("k-1.json", json("[2]"), &PutOptions::json()).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(name) if name == "k-1.json"));
    }

    #[tokio::test]
    async fn empty_pathname_is_rejected() {
        let store = InMemoryObjectStore::new();
        let err = store.put("", json("[]"), &PutOptions::json()).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidPathname { .. }));
    }

    #[tokio::test]
    async fn list_is_a_prefix_match() {
        let store = InMemoryObjectStore::new();
        for name in ["a-1.json", "a-b-1.json", "ab-1.json", "b-1.json"] {
            store.put(name, json("[]"), &PutOptions::json()).await.unwrap();
        }
        let listed: Vec<_> = store
            .list("a-")
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.pathname)
            .collect();
        assert_eq!(listed, ["a-1.json", "a-b-1.json"]);
        assert_eq!(store.list("").await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn upload_times_strictly_increase() {
        let store = InMemoryObjectStore::new();
        let mut last = None;
        for i in 0..20 {
            let meta = store
                .put(&format!("k-{i}.json"), json("[]"), &PutOptions::json())
                .await
                .unwrap();
            if let Some(prev) = last {
                assert!(meta.uploaded_at > prev);
            }
            last = Some(meta.uploaded_at);
        }
    }

    #[tokio::test]
    async fn delete_is_batch_and_tolerates_missing() {
        let store = InMemoryObjectStore::new();
        let a = store.put("a.json", json("[]"), &PutOptions::json()).await.unwrap();
        let b = store.put("b.json", json("[]"), &PutOptions::json()).await.unwrap();
        store.delete(&[a.clone(), b]).await.unwrap();
        assert!(store.is_empty());
        // Second delete of the same blob is fine.
        store.delete(&[a]).await.unwrap();
    }

    #[tokio::test]
    async fn find_matches_exact_pathname_only() {
        let store = InMemoryObjectStore::new();
        store.put("topics.json.bak", json("[]"), &PutOptions::json()).await.unwrap();
        assert!(store.find("topics.json").await.unwrap().is_none());
        store.put("topics.json", json("[]"), &PutOptions::json()).await.unwrap();
        let found = store.find("topics.json").await.unwrap().unwrap();
        assert_eq!(found.pathname, "topics.json");
    }

    // -----------------------------------------------------------------------
    // Edge cache
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn cached_fetch_serves_stale_content_after_overwrite() {
        let store = InMemoryObjectStore::new();
        let overwrite = PutOptions::json().with_overwrite(true);
        let first = store.put("topics.json", json("[\"old\"]"), &overwrite).await.unwrap();
        assert_eq!(store.fetch(&first, Freshness::Cached).await.unwrap(), json("[\"old\"]"));

        let second = store.put("topics.json", json("[\"new\"]"), &overwrite).await.unwrap();
        assert_eq!(first.url, second.url);

        // Cached read still sees the old bytes; revalidation does not.
        assert_eq!(store.fetch(&second, Freshness::Cached).await.unwrap(), json("[\"old\"]"));
        assert_eq!(store.fetch(&second, Freshness::Revalidate).await.unwrap(), json("[\"new\"]"));
        // Revalidation refreshed the cache.
        assert_eq!(store.fetch(&second, Freshness::Cached).await.unwrap(), json("[\"new\"]"));
    }

    #[tokio::test]
    async fn fetch_of_deleted_blob_is_not_found() {
        let store = InMemoryObjectStore::new();
        let meta = store.put("gone.json", json("[]"), &PutOptions::json()).await.unwrap();
        store.fetch(&meta, Freshness::Cached).await.unwrap();
        store.delete(&[meta.clone()]).await.unwrap();

        for freshness in [Freshness::Cached, Freshness::Revalidate] {
            let err = store.fetch(&meta, freshness).await.unwrap_err();
            assert!(err.is_not_found());
        }
    }

    #[tokio::test]
    async fn edge_cache_shrinks_with_deletes() {
        let store = InMemoryObjectStore::new();
        let mut live: Vec<BlobMeta> = Vec::new();
        for i in 0..100 {
            let meta = store.put(&format!("k-{i}.json"), json("[]"), &PutOptions::json()).await.unwrap();
            store.fetch(&meta, Freshness::Revalidate).await.unwrap();
            live.push(meta);
            if live.len() > 3 {
                let expired: Vec<BlobMeta> = live.drain(..live.len() - 3).collect();
                store.delete(&expired).await.unwrap();
            }
        }
        assert_eq!(store.len(), 3);
        assert!(store.edge_cache.read().unwrap().len() <= store.len());
    }

    // -----------------------------------------------------------------------
    // Fault injection
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn injected_faults_fail_until_healed() {
        let store = InMemoryObjectStore::new();
        store.inject(Fault::Put);
        let err = store.put("x.json", json("[]"), &PutOptions::json()).await.unwrap_err();
        assert!(matches!(err, StoreError::Injected("put")));
        assert!(store.is_empty());

        store.heal(Fault::Put);
        let meta = store.put("x.json", json("[]"), &PutOptions::json()).await.unwrap();

        store.inject(Fault::List);
        store.inject(Fault::Fetch);
        store.inject(Fault::Delete);
        assert!(store.list("").await.is_err());
        assert!(store.fetch(&meta, Freshness::Revalidate).await.is_err());
        assert!(store.delete(&[meta.clone()]).await.is_err());
        assert_eq!(store.len(), 1);

        store.clear_faults();
        store.delete(&[meta]).await.unwrap();
        assert!(store.is_empty());
    }

    // -----------------------------------------------------------------------
    // Utility methods
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn put_at_sets_explicit_upload_time() {
        let store = InMemoryObjectStore::new();
        let at = Utc::now() + Duration::days(1);
        let meta = store.put_at("k-1.json", "[]", at);
        assert_eq!(meta.uploaded_at, at);
        // The regular clock continues after the explicit time.
        let next = store.put("k-2.json", json("[]"), &PutOptions::json()).await.unwrap();
        assert!(next.uploaded_at > at);
    }

    #[tokio::test]
    async fn len_total_bytes_and_clear() {
        let store = InMemoryObjectStore::default();
        assert!(store.is_empty());
        store.put("a", json("12345"), &PutOptions::json()).await.unwrap();
        store.put("b", json("123456789"), &PutOptions::json()).await.unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.total_bytes(), 14);
        assert_eq!(store.pathnames(), ["a", "b"]);

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn debug_format() {
        let store = InMemoryObjectStore::new();
        let debug = format!("{store:?}");
        assert!(debug.contains("InMemoryObjectStore"));
        assert!(debug.contains("blob_count"));
    }
}
