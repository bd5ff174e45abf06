use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use blobver_versioned::VersionedError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Startup and configuration failures.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Versioned(#[from] VersionedError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

/// A failed request, rendered as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error(transparent)]
    Store(#[from] VersionedError),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Store(e) => match e {
                VersionedError::InvalidKey(_) => StatusCode::BAD_REQUEST,
                VersionedError::NotFound(_) => StatusCode::NOT_FOUND,
                VersionedError::Conflict(_) | VersionedError::VersionConflict { .. } => StatusCode::CONFLICT,
                VersionedError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
                VersionedError::Read { .. } | VersionedError::Write { .. } | VersionedError::Prune { .. } => {
                    StatusCode::BAD_GATEWAY
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(%status, error = %self, "request failed");
        } else if status == StatusCode::CONFLICT {
            warn!(error = %self, "request conflicted");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blobver_types::LogicalKey;

    #[test]
    fn status_mapping() {
        let cases = [
            (ApiError::bad_request("x"), StatusCode::BAD_REQUEST),
            (ApiError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (VersionedError::NotFound("t".into()).into(), StatusCode::NOT_FOUND),
            (VersionedError::Conflict("t".into()).into(), StatusCode::CONFLICT),
            (
                VersionedError::VersionConflict {
                    key: "k".into(),
                    expected: "a".into(),
                    actual: "b".into(),
                }
                .into(),
                StatusCode::CONFLICT,
            ),
            (VersionedError::Configuration("t".into()).into(), StatusCode::SERVICE_UNAVAILABLE),
            (
                VersionedError::Write {
                    key: "k".into(),
                    reason: "r".into(),
                }
                .into(),
                StatusCode::BAD_GATEWAY,
            ),
            (
                VersionedError::from(LogicalKey::new("a/b").unwrap_err()).into(),
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.status(), status, "{err}");
        }
    }
}
