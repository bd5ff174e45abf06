//! Error types for versioned collection operations.

use blobver_types::TypeError;
use thiserror::Error;

/// Errors that can occur while reading or replacing a versioned collection.
///
/// Propagation rules:
/// - `Configuration` and `Write` always reach the caller.
/// - `Read` always reaches callers of `read_latest` and `update`; only the
///   display read `read_latest_or_empty` turns it into an empty collection.
/// - `Prune` is never returned from a write. A failed post-write sweep is
///   logged and reported in the write's `PruneReport` instead.
#[derive(Debug, Error)]
pub enum VersionedError {
    /// The store has no usable backend (e.g. missing credential) or was given
    /// an invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Listing, fetching or parsing the latest version failed.
    #[error("read failed for key {key}: {reason}")]
    Read { key: String, reason: String },

    /// Creating the new version blob failed.
    #[error("write failed for key {key}: {reason}")]
    Write { key: String, reason: String },

    /// Deleting superseded versions failed.
    #[error("prune failed for key {key}: {reason}")]
    Prune { key: String, reason: String },

    /// A record inside a collection does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A caller-enforced ownership or uniqueness check failed.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The current version is not the one the write was based on.
    #[error("version conflict for key {key}: expected {expected}, found {actual}")]
    VersionConflict {
        key: String,
        expected: String,
        actual: String,
    },

    /// The logical key or prefix is invalid.
    #[error("invalid key: {0}")]
    InvalidKey(#[from] TypeError),
}

/// Convenience type alias for versioned collection operations.
pub type VersionedResult<T> = std::result::Result<T, VersionedError>;
