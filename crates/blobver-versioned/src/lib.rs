//! Versioned JSON collections on top of an immutable object store.
//!
//! A logical key (the topic catalogue, the user list, one topic's
//! leaderboard) names a JSON array. The store has no update primitive, so
//! each replacement of the array is written as a new blob and the newest
//! blob is the current value.
//!
//! # Architecture
//!
//! - **Reads** list `{prefix}{key}-`, keep the names that parse as versions
//!   of exactly this key, pick the newest and fetch it past any cache.
//! - **Writes** create `{prefix}{key}-{millis}.json` with a monotonic stamp,
//!   optionally after checking the caller's [`Expected`] version, then sweep
//!   versions beyond the retention window in one batch.
//! - **Failures** are tagged: a read that feeds a write-back either yields a
//!   [`Snapshot`] or an error, never an empty stand-in. Only the display read
//!   [`VersionedStore::read_latest_or_empty`] degrades to empty.
//!
//! # Modules
//!
//! - [`error`] — [`VersionedError`] and its propagation rules
//! - [`config`] — [`VersionedConfig`] and [`Durability`]
//! - [`types`] — snapshots, expectations and write outcomes
//! - [`retention`] — version ordering and the retention window
//! - [`store`] — [`VersionedStore`]

pub mod config;
pub mod error;
pub mod retention;
pub mod store;
pub mod types;

pub use config::{Durability, VersionedConfig, DEFAULT_RETENTION};
pub use error::{VersionedError, VersionedResult};
pub use store::VersionedStore;
pub use types::{Expected, PruneReport, Snapshot, SnapshotSource, Updated, VersionInfo, WriteOutcome};
