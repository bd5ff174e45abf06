//! Local directory backend.
//!
//! Mirrors the blob service's layout on disk for local development: the
//! pathname `users-store/users-1700000000000.json` lives at
//! `{root}/users-store/users-1700000000000.json`. The upload time is the
//! file's modification time. There is no cache in front of the files, so
//! [`Freshness`] has no effect.
//!
//! Content is written to a temporary file next to the target and renamed into
//! place, so a blob name only ever refers to a complete body.

use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use blobver_types::BlobMeta;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::error::{StoreError, StoreResult};
use crate::object::{Freshness, PutOptions};
use crate::traits::ObjectStore;

/// Name prefix of in-flight temporary files. Never listed.
const TEMP_PREFIX: &str = ".blobver-tmp-";

/// Object store backed by a local directory tree.
#[derive(Clone, Debug)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, pathname: &str) -> StoreResult<PathBuf> {
        let invalid = |reason: &str| StoreError::InvalidPathname {
            pathname: pathname.to_string(),
            reason: reason.to_string(),
        };
        if pathname.is_empty() {
            return Err(invalid("pathname must not be empty"));
        }
        let relative = Path::new(pathname);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(invalid("must be a relative path without '.' or '..' components"));
        }
        Ok(self.root.join(relative))
    }

    fn meta_for(&self, pathname: &str, path: &Path, metadata: &std::fs::Metadata) -> BlobMeta {
        let uploaded_at = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        BlobMeta {
            pathname: pathname.to_string(),
            url: format!("file://{}", path.display()),
            size: metadata.len(),
            uploaded_at,
        }
    }
}

/// Write `body` to a temporary file in `dir`, then move it to `target`.
///
/// Without `overwrite` an existing target fails with `AlreadyExists`. On any
/// failure the temporary file is removed when it drops.
fn write_atomically(dir: &Path, target: &Path, body: &[u8], overwrite: bool) -> std::io::Result<()> {
    let mut temp = tempfile::Builder::new().prefix(TEMP_PREFIX).tempfile_in(dir)?;
    temp.write_all(body)?;
    temp.as_file().sync_all()?;
    persist(temp, target, overwrite)
}

fn persist(temp: NamedTempFile, target: &Path, overwrite: bool) -> std::io::Result<()> {
    let persisted = if overwrite {
        temp.persist(target)
    } else {
        temp.persist_noclobber(target)
    };
    persisted.map(drop).map_err(|e| e.error)
}

fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(TEMP_PREFIX))
}

/// Forward-slash pathname of `path` relative to `root`.
fn pathname_of(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Option<Vec<&str>> = relative.components().map(|c| c.as_os_str().to_str()).collect();
    Some(parts?.join("/"))
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    fn backend_name(&self) -> &'static str {
        "fs"
    }

    async fn put(&self, pathname: &str, body: Bytes, options: &PutOptions) -> StoreResult<BlobMeta> {
        let path = self.path_for(pathname)?;
        let dir = path.parent().map_or_else(|| self.root.clone(), Path::to_path_buf);
        tokio::fs::create_dir_all(&dir).await?;

        let target = path.clone();
        let data = body.clone();
        let overwrite = options.allow_overwrite;
        let written = tokio::task::spawn_blocking(move || write_atomically(&dir, &target, &data, overwrite))
            .await
            .map_err(|e| StoreError::Io(std::io::Error::new(ErrorKind::Other, e)))?;
        match written {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StoreError::AlreadyExists(pathname.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        let metadata = tokio::fs::metadata(&path).await?;
        debug!(pathname, bytes = body.len(), "wrote blob file");
        Ok(self.meta_for(pathname, &path, &metadata))
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<BlobMeta>> {
        let store = self.clone();
        let prefix = prefix.to_string();
        tokio::task::spawn_blocking(move || {
            let mut blobs = Vec::new();
            for entry in WalkDir::new(&store.root).follow_links(false) {
                let entry = entry.map_err(|e| {
                    e.into_io_error()
                        .map(StoreError::Io)
                        .unwrap_or_else(|| StoreError::Serialization("directory walk loop".into()))
                })?;
                if !entry.file_type().is_file() || is_temp_file(entry.path()) {
                    continue;
                }
                let Some(pathname) = pathname_of(&store.root, entry.path()) else {
                    warn!(path = %entry.path().display(), "skipping non UTF-8 blob path");
                    continue;
                };
                if !pathname.starts_with(&prefix) {
                    continue;
                }
                let metadata = entry.metadata().map_err(|e| {
                    e.into_io_error()
                        .map(StoreError::Io)
                        .unwrap_or_else(|| StoreError::Serialization("metadata unavailable".into()))
                })?;
                blobs.push(store.meta_for(&pathname, entry.path(), &metadata));
            }
            blobs.sort_by(|a, b| a.pathname.cmp(&b.pathname));
            Ok(blobs)
        })
        .await
        .map_err(|e| StoreError::Io(std::io::Error::new(ErrorKind::Other, e)))?
    }

    async fn fetch(&self, blob: &BlobMeta, _freshness: Freshness) -> StoreResult<Bytes> {
        let path = self.path_for(&blob.pathname)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(blob.pathname.clone())),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, blobs: &[BlobMeta]) -> StoreResult<()> {
        for blob in blobs {
            let path = self.path_for(&blob.pathname)?;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
