//! The versioned collection store.
//!
//! A logical key maps to a JSON array. Every write creates a new immutable
//! blob `{prefix}{key}-{millis}.json`; the current value is the newest such
//! blob. After a persisted write, versions beyond the retention window are
//! deleted in one batch.
//!
//! Consistency contract: reads always revalidate past any cache, but the
//! store's listing is eventually consistent. A read right after a write made
//! elsewhere may still see the previous version. Concurrent read-modify-write
//! cycles on one key lose updates unless the writer passes the [`Expected`]
//! version from its snapshot, and even then the check is advisory: two writers
//! can pass it in the same instant.

use std::sync::Arc;

use blobver_store::{Freshness, ObjectStore, PutOptions, StoreError};
use blobver_types::{BlobMeta, LogicalKey, VersionClock, VersionName};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::config::{Durability, VersionedConfig};
use crate::error::{VersionedError, VersionedResult};
use crate::retention::{latest, split_for_retention, versions_of};
use crate::types::{Expected, PruneReport, Snapshot, SnapshotSource, Updated, VersionInfo, WriteOutcome};

/// Attempts at picking a fresh version name when another writer already
/// created the one we chose.
const MAX_NAME_ATTEMPTS: usize = 3;

enum Backend {
    Ready(Arc<dyn ObjectStore>),
    Unconfigured { reason: String },
}

/// Read/replace access to versioned JSON collections under one prefix.
pub struct VersionedStore {
    backend: Backend,
    config: VersionedConfig,
    clock: VersionClock,
}

impl VersionedStore {
    /// Build a store over `objects` after validating `config`.
    pub fn new(objects: Arc<dyn ObjectStore>, config: VersionedConfig) -> VersionedResult<Self> {
        config.validate()?;
        Ok(Self {
            backend: Backend::Ready(objects),
            config,
            clock: VersionClock::new(),
        })
    }

    /// Build a store with no backend, e.g. because the credential is missing.
    ///
    /// Display reads return empty collections with a warning; every other
    /// operation fails with [`VersionedError::Configuration`].
    pub fn unconfigured(reason: impl Into<String>, config: VersionedConfig) -> VersionedResult<Self> {
        config.validate()?;
        Ok(Self {
            backend: Backend::Unconfigured { reason: reason.into() },
            config,
            clock: VersionClock::new(),
        })
    }

    pub fn is_configured(&self) -> bool {
        matches!(self.backend, Backend::Ready(_))
    }

    pub fn config(&self) -> &VersionedConfig {
        &self.config
    }

    /// Name of the object store backend, or `"unconfigured"`.
    pub fn backend_name(&self) -> &'static str {
        match &self.backend {
            Backend::Ready(objects) => objects.backend_name(),
            Backend::Unconfigured { .. } => "unconfigured",
        }
    }

    fn objects(&self) -> VersionedResult<&Arc<dyn ObjectStore>> {
        match &self.backend {
            Backend::Ready(objects) => Ok(objects),
            Backend::Unconfigured { reason } => Err(VersionedError::Configuration(reason.clone())),
        }
    }

    /// All versions of `key`, newest first.
    pub async fn versions(&self, key: &LogicalKey) -> VersionedResult<Vec<VersionInfo>> {
        let objects = self.objects()?;
        self.list_versions(objects, key).await.map_err(|e| VersionedError::Read {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    async fn list_versions(
        &self,
        objects: &Arc<dyn ObjectStore>,
        key: &LogicalKey,
    ) -> Result<Vec<VersionInfo>, StoreError> {
        let listed = objects
            .list(&VersionName::list_prefix(&self.config.prefix, key))
            .await?;
        Ok(versions_of(&self.config.prefix, key, listed))
    }

    /// Fetch past any cache and parse a JSON array.
    async fn fetch_items<T: DeserializeOwned>(
        &self,
        objects: &Arc<dyn ObjectStore>,
        key: &LogicalKey,
        blob: &BlobMeta,
    ) -> VersionedResult<Vec<T>> {
        let read_error = |reason: String| VersionedError::Read {
            key: key.to_string(),
            reason,
        };
        let body = objects
            .fetch(blob, Freshness::Revalidate)
            .await
            .map_err(|e| read_error(format!("fetching {}: {e}", blob.pathname)))?;
        serde_json::from_slice(&body)
            .map_err(|e| read_error(format!("{} is not a JSON array of records: {e}", blob.pathname)))
    }

    /// Read the current collection of `key`.
    ///
    /// Falls back to the legacy blob when the key has no versions, and to an
    /// empty collection when neither exists. Any list, fetch or parse failure
    /// is returned as [`VersionedError::Read`], never as an empty collection.
    pub async fn read_latest<T: DeserializeOwned>(&self, key: &LogicalKey) -> VersionedResult<Snapshot<T>> {
        let objects = self.objects()?;
        let mut versions = self.versions(key).await?;

        if !versions.is_empty() {
            let current = versions.swap_remove(0);
            let items = self.fetch_items(objects, key, &current.blob).await?;
            debug!(%key, version = current.pathname(), count = items.len(), "read latest version");
            return Ok(Snapshot {
                items,
                source: SnapshotSource::Versioned(current),
            });
        }

        if let Some(legacy) = &self.config.legacy_pathname {
            let found = objects.find(legacy).await.map_err(|e| VersionedError::Read {
                key: key.to_string(),
                reason: format!("looking up legacy blob {legacy}: {e}"),
            })?;
            if let Some(blob) = found {
                let items = self.fetch_items(objects, key, &blob).await?;
                debug!(%key, legacy = %blob.pathname, count = items.len(), "read legacy blob");
                return Ok(Snapshot {
                    items,
                    source: SnapshotSource::Legacy(blob),
                });
            }
        }

        debug!(%key, "no versions yet");
        Ok(Snapshot {
            items: Vec::new(),
            source: SnapshotSource::Empty,
        })
    }

    /// Read for display only: any failure yields an empty collection and a
    /// warning.
    ///
    /// The result carries no version, so it cannot be handed to a write as a
    /// basis. Use [`read_latest`](Self::read_latest) or [`update`](Self::update)
    /// for anything that writes back.
    pub async fn read_latest_or_empty<T: DeserializeOwned>(&self, key: &LogicalKey) -> Vec<T> {
        match self.read_latest(key).await {
            Ok(snapshot) => snapshot.items,
            Err(VersionedError::Configuration(reason)) => {
                warn!(%key, %reason, "object store not configured, serving empty collection");
                Vec::new()
            }
            Err(e) => {
                warn!(%key, error = %e, "read failed, serving empty collection");
                Vec::new()
            }
        }
    }

    /// Store `items` as the new current collection of `key`.
    ///
    /// Unless `expected` is [`Expected::Any`], the current latest version is
    /// checked first and a mismatch fails with
    /// [`VersionedError::VersionConflict`]. A failed create is returned as
    /// [`VersionedError::Write`] under enforced durability and reported as
    /// [`WriteOutcome::Skipped`] under best effort. The retention sweep that
    /// follows never fails the write.
    #[instrument(skip(self, items), fields(prefix = %self.config.prefix, count = items.len()))]
    pub async fn write_new_version<T: Serialize + Sync>(
        &self,
        key: &LogicalKey,
        items: &[T],
        expected: &Expected,
    ) -> VersionedResult<WriteOutcome> {
        let objects = self.objects()?;
        let write_error = |reason: String| VersionedError::Write {
            key: key.to_string(),
            reason,
        };
        let body = Bytes::from(serde_json::to_vec(items).map_err(|e| write_error(e.to_string()))?);

        if *expected != Expected::Any {
            let versions = self.versions(key).await?;
            let current = latest(&versions);
            if let Some(current) = current {
                self.clock.observe(current.name.stamp());
            }
            check_expected(key, expected, current)?;
        }

        let mut attempt = 0;
        let blob = loop {
            attempt += 1;
            let name = VersionName::new(&self.config.prefix, key, self.clock.next());
            match objects.put(name.pathname(), body.clone(), &PutOptions::json()).await {
                Ok(blob) => break VersionInfo { name, blob },
                Err(StoreError::AlreadyExists(pathname)) if attempt < MAX_NAME_ATTEMPTS => {
                    debug!(%pathname, "version name taken, retrying with a later stamp");
                }
                Err(e) => {
                    let reason = format!("creating {}: {e}", name.pathname());
                    return match self.config.durability {
                        Durability::Enforced => Err(write_error(reason)),
                        Durability::BestEffort => {
                            warn!(%key, %reason, "write skipped under best-effort durability");
                            Ok(WriteOutcome::Skipped { reason })
                        }
                    };
                }
            }
        };

        info!(%key, version = blob.pathname(), bytes = body.len(), "wrote new version");
        let prune = self.sweep(objects, key, Some(blob.pathname())).await;
        Ok(WriteOutcome::Persisted { version: blob, prune })
    }

    /// Read-modify-write `key` with `change`.
    ///
    /// The read propagates failures and the write expects the version that was
    /// read, so a concurrent writer turns into
    /// [`VersionedError::VersionConflict`] instead of a lost update.
    pub async fn update<T, F>(&self, key: &LogicalKey, change: F) -> VersionedResult<Updated<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce(Vec<T>) -> VersionedResult<Vec<T>> + Send,
    {
        let snapshot = self.read_latest::<T>(key).await?;
        let expected = snapshot.expected();
        let items = change(snapshot.items)?;
        let outcome = self.write_new_version(key, &items, &expected).await?;
        Ok(Updated { items, outcome })
    }

    /// Delete versions of `key` beyond the retention window.
    ///
    /// Unlike the sweep after a write, failures are returned as
    /// [`VersionedError::Prune`].
    pub async fn prune(&self, key: &LogicalKey) -> VersionedResult<PruneReport> {
        let objects = self.objects()?;
        let report = self.sweep(objects, key, None).await;
        match report.failure {
            Some(reason) => Err(VersionedError::Prune {
                key: key.to_string(),
                reason,
            }),
            None => Ok(report),
        }
    }

    async fn sweep(&self, objects: &Arc<dyn ObjectStore>, key: &LogicalKey, pinned: Option<&str>) -> PruneReport {
        let versions = match self.list_versions(objects, key).await {
            Ok(versions) => versions,
            Err(e) => {
                warn!(%key, error = %e, "retention sweep could not list versions");
                return PruneReport {
                    failure: Some(format!("listing versions: {e}")),
                    ..PruneReport::default()
                };
            }
        };

        let (retained, expired) = split_for_retention(versions, self.config.retention, pinned);
        let mut report = PruneReport {
            retained: retained.iter().map(|v| v.pathname().to_string()).collect(),
            ..PruneReport::default()
        };
        if expired.is_empty() {
            return report;
        }

        let batch: Vec<BlobMeta> = expired.into_iter().map(|v| v.blob).collect();
        match objects.delete(&batch).await {
            Ok(()) => {
                report.deleted = batch.into_iter().map(|b| b.pathname).collect();
                debug!(%key, deleted = report.deleted.len(), "pruned superseded versions");
            }
            Err(e) => {
                warn!(%key, error = %e, leaked = batch.len(), "retention sweep failed, superseded versions remain");
                report.failure = Some(format!("deleting {} versions: {e}", batch.len()));
            }
        }
        report
    }
}

fn check_expected(key: &LogicalKey, expected: &Expected, current: Option<&VersionInfo>) -> VersionedResult<()> {
    let matches = match (expected, current) {
        (Expected::Any, _) => true,
        (Expected::Absent, None) => true,
        (Expected::Version(pathname), Some(current)) => current.pathname() == pathname,
        _ => false,
    };
    if matches {
        return Ok(());
    }
    Err(VersionedError::VersionConflict {
        key: key.to_string(),
        expected: expected.to_string(),
        actual: current.map_or_else(|| Expected::Absent.to_string(), |c| c.pathname().to_string()),
    })
}

impl std::fmt::Debug for VersionedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionedStore")
            .field("backend", &self.backend_name())
            .field("config", &self.config)
            .finish()
    }
}
