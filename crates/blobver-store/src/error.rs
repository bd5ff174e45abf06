/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested blob was not found.
    #[error("blob not found: {0}")]
    NotFound(String),

    /// A blob already exists under this pathname and overwrite was not allowed.
    #[error("blob already exists: {0}")]
    AlreadyExists(String),

    /// The pathname cannot be stored by this backend.
    #[error("invalid pathname {pathname:?}: {reason}")]
    InvalidPathname { pathname: String, reason: String },

    /// No access credential is available for the remote store.
    #[error("object store credential missing: {0}")]
    MissingCredential(String),

    /// The remote store answered with a non-success status.
    #[error("object store returned {status}: {message}")]
    Http { status: u16, message: String },

    /// The request never produced a response (connect, TLS, body read).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A fault injected into an in-memory store.
    #[error("injected {0} failure")]
    Injected(&'static str),
}

impl StoreError {
    /// Returns `true` for errors that mean "nothing is stored there".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
