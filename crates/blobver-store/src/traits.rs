use async_trait::async_trait;
use blobver_types::BlobMeta;
use bytes::Bytes;

use crate::error::StoreResult;
use crate::object::{Freshness, PutOptions};

/// Client for an object store of immutable, named byte blobs.
///
/// All implementations must satisfy these invariants:
/// - A blob's content never changes after `put` returns, unless the caller
///   explicitly asked for overwrite.
/// - `list` is a plain string-prefix match on pathnames and may lag behind
///   recent writes and deletes.
/// - `delete` tolerates blobs that are already gone.
/// - All errors are propagated, never silently ignored. No retries happen at
///   this layer.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Short backend name for logs (`"http"`, `"fs"`, `"memory"`).
    fn backend_name(&self) -> &'static str;

    /// Create a blob at `pathname` and return its metadata.
    async fn put(&self, pathname: &str, body: Bytes, options: &PutOptions) -> StoreResult<BlobMeta>;

    /// List every blob whose pathname starts with `prefix`.
    async fn list(&self, prefix: &str) -> StoreResult<Vec<BlobMeta>>;

    /// Fetch the content of a listed blob.
    async fn fetch(&self, blob: &BlobMeta, freshness: Freshness) -> StoreResult<Bytes>;

    /// Delete a batch of blobs in one call.
    async fn delete(&self, blobs: &[BlobMeta]) -> StoreResult<()>;

    /// Look up a single blob by exact pathname.
    ///
    /// Default implementation lists by the pathname as prefix and picks the
    /// exact match.
    async fn find(&self, pathname: &str) -> StoreResult<Option<BlobMeta>> {
        let blobs = self.list(pathname).await?;
        Ok(blobs.into_iter().find(|b| b.pathname == pathname))
    }
}
