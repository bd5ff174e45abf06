//! Result and argument types of the versioned collection API.
//!
//! Reads return a [`Snapshot`] that remembers which blob it came from, so a
//! later write can state the version it was based on ([`Expected`]). Writes
//! return a [`WriteOutcome`] that distinguishes a persisted version from a
//! best-effort skip, and carries the retention sweep's [`PruneReport`].

use std::cmp::Ordering;
use std::fmt;

use blobver_types::{BlobMeta, VersionName};
use serde::Serialize;

/// A listed blob that parsed as a version of the key it was listed for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionInfo {
    pub name: VersionName,
    pub blob: BlobMeta,
}

impl VersionInfo {
    pub fn pathname(&self) -> &str {
        self.name.pathname()
    }

    /// Newest-first order: upload time, then the stamp in the name, then the
    /// pathname, all descending. Total and independent of list order.
    pub fn cmp_newest_first(&self, other: &Self) -> Ordering {
        other
            .blob
            .uploaded_at
            .cmp(&self.blob.uploaded_at)
            .then_with(|| other.name.stamp().cmp(&self.name.stamp()))
            .then_with(|| other.pathname().cmp(self.pathname()))
    }
}

/// The version a write expects to replace.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Expected {
    /// Last writer wins, no check.
    #[default]
    Any,
    /// The key must have no versions yet.
    Absent,
    /// The latest version must be the blob with this pathname.
    Version(String),
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any"),
            Self::Absent => f.write_str("no version"),
            Self::Version(pathname) => f.write_str(pathname),
        }
    }
}

/// Where the items of a [`Snapshot`] came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SnapshotSource {
    /// The key has no versions and no legacy blob.
    Empty,
    /// The latest version blob.
    Versioned(VersionInfo),
    /// The read-only legacy single-file blob.
    Legacy(BlobMeta),
}

/// A successfully read collection.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot<T> {
    pub items: Vec<T>,
    pub source: SnapshotSource,
}

impl<T> Snapshot<T> {
    /// The expectation a write based on this snapshot should carry.
    ///
    /// A legacy or empty read expects no versions: the first versioned write
    /// must not silently replace one written by someone else meanwhile.
    pub fn expected(&self) -> Expected {
        match &self.source {
            SnapshotSource::Versioned(info) => Expected::Version(info.pathname().to_string()),
            SnapshotSource::Empty | SnapshotSource::Legacy(_) => Expected::Absent,
        }
    }

    /// Pathname of the version this snapshot was read from, if any.
    pub fn version(&self) -> Option<&str> {
        match &self.source {
            SnapshotSource::Versioned(info) => Some(info.pathname()),
            _ => None,
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self.source, SnapshotSource::Legacy(_))
    }
}

/// Result of the retention sweep that follows a persisted write.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    /// Pathnames kept, newest first.
    pub retained: Vec<String>,
    /// Pathnames deleted in this sweep.
    pub deleted: Vec<String>,
    /// Why the sweep failed, if it did. Superseded versions then stay until
    /// the next successful sweep.
    pub failure: Option<String>,
}

impl PruneReport {
    pub fn is_clean(&self) -> bool {
        self.failure.is_none()
    }
}

/// What happened to a write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    /// A new version blob exists.
    Persisted { version: VersionInfo, prune: PruneReport },
    /// The create failed under best-effort durability; nothing was stored.
    Skipped { reason: String },
}

impl WriteOutcome {
    pub fn is_persisted(&self) -> bool {
        matches!(self, Self::Persisted { .. })
    }

    /// Pathname of the written version, if one was written.
    pub fn version(&self) -> Option<&str> {
        match self {
            Self::Persisted { version, .. } => Some(version.pathname()),
            Self::Skipped { .. } => None,
        }
    }
}

/// Result of a read-modify-write update.
#[derive(Clone, Debug, PartialEq)]
pub struct Updated<T> {
    pub items: Vec<T>,
    pub outcome: WriteOutcome,
}
