/// Content type written for every JSON blob.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Options for creating a blob.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PutOptions {
    /// MIME type stored with the blob.
    pub content_type: String,
    /// Replace an existing blob of the same pathname instead of failing.
    ///
    /// Version blobs never set this; only the single-file legacy layout
    /// (and tests modelling it) overwrite in place.
    pub allow_overwrite: bool,
}

impl PutOptions {
    /// Create-only JSON upload.
    pub fn json() -> Self {
        Self {
            content_type: JSON_CONTENT_TYPE.to_string(),
            allow_overwrite: false,
        }
    }

    pub fn with_overwrite(mut self, allow: bool) -> Self {
        self.allow_overwrite = allow;
        self
    }
}

impl Default for PutOptions {
    fn default() -> Self {
        Self::json()
    }
}

/// How a content fetch may be satisfied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Freshness {
    /// Any cache between the caller and the stored bytes may answer.
    Cached,
    /// Bypass caches: the answer must come from the stored bytes.
    Revalidate,
}
