//! Object store client for blobver.
//!
//! This crate is the leaf layer: it creates, lists, fetches and deletes
//! immutable named byte blobs. It never interprets blob contents and never
//! retries; every failure is returned to the caller.
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`HttpObjectStore`] -- hosted blob service over HTTPS (production)
//! - [`FsObjectStore`] -- local directory tree (development)
//! - [`InMemoryObjectStore`] -- tests and embedding, with a stale edge-cache
//!   model and fault injection
//!
//! # Design Rules
//!
//! 1. Blobs are immutable once written unless overwrite is requested.
//! 2. Listing is a string-prefix match and is only eventually consistent.
//! 3. Content reads that feed a decision use [`Freshness::Revalidate`].
//! 4. Delete is a single batch call and tolerates already-deleted blobs.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod fs;
pub mod http;
pub mod memory;
pub mod object;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{StoreError, StoreResult};
pub use fs::FsObjectStore;
pub use http::{HttpObjectStore, HttpStoreConfig, DEFAULT_API_URL, DEFAULT_API_VERSION, DEFAULT_TOKEN_ENV};
pub use memory::{Fault, InMemoryObjectStore};
pub use object::{Freshness, PutOptions, JSON_CONTENT_TYPE};
pub use traits::ObjectStore;
