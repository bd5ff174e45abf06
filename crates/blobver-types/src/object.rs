use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata of one immutable blob as reported by the object store.
///
/// Field names follow the blob service's list payload (`uploadedAt`, ...),
/// so the same type deserializes directly from list responses.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobMeta {
    /// Store-relative name, e.g. `users-store/users-1700000000000.json`.
    pub pathname: String,
    /// Address the content is fetched from.
    pub url: String,
    /// Content length in bytes.
    #[serde(default)]
    pub size: u64,
    /// Upload time assigned by the store.
    pub uploaded_at: DateTime<Utc>,
}
