//! Foundation types for blobver.
//!
//! blobver keeps mutable JSON collections on top of an object store whose
//! blobs are write-once. This crate holds the vocabulary shared by every
//! other crate in the workspace.
//!
//! # Key Types
//!
//! - [`LogicalKey`] — validated name of one independent collection
//! - [`VersionStamp`] — epoch-millisecond stamp embedded in version names
//! - [`VersionClock`] — monotonic issuer of stamps
//! - [`VersionName`] — `{prefix}{key}-{millis}.json` formatting and parsing
//! - [`BlobMeta`] — blob metadata as reported by the object store

pub mod error;
pub mod key;
pub mod object;
pub mod temporal;
pub mod version;

pub use error::TypeError;
pub use key::{validate_key, LogicalKey, MAX_KEY_LEN};
pub use object::BlobMeta;
pub use temporal::{VersionClock, VersionStamp};
pub use version::{validate_prefix, VersionName, VERSION_SUFFIX};
