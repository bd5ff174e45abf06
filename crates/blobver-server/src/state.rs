use std::sync::Arc;

use blobver_types::LogicalKey;
use blobver_versioned::{VersionedError, VersionedStore};
use tracing::warn;

use crate::auth::CredentialDigest;
use crate::config::{BlobverConfig, ObjectBackend};
use crate::error::ServerResult;

pub const TOPICS_PREFIX: &str = "topics-store/";
pub const TOPICS_KEY: &str = "topics";
/// Single-file layout used before topics were versioned.
pub const TOPICS_LEGACY_PATHNAME: &str = "topics.json";
pub const USERS_PREFIX: &str = "users-store/";
pub const USERS_KEY: &str = "users";
pub const LEADERBOARD_PREFIX: &str = "leaderboard-store/";

/// Secret used when none is configured. Digests made with it are only as
/// private as this source file.
const DEV_AUTH_SECRET: &str = "blobver-insecure-development-secret";

/// Shared request state: one versioned store per collection family over a
/// single backend.
pub struct AppState {
    pub topics: VersionedStore,
    pub users: VersionedStore,
    /// Keyed by topic id.
    pub leaderboards: VersionedStore,
    pub digest: CredentialDigest,
    pub topics_key: LogicalKey,
    pub users_key: LogicalKey,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: &BlobverConfig, backend: &ObjectBackend) -> ServerResult<Self> {
        let secret = config.auth_secret().unwrap_or_else(|| {
            warn!("no auth_secret configured, using the development secret");
            DEV_AUTH_SECRET.to_string()
        });
        Ok(Self {
            topics: backend.versioned(config.versioned(TOPICS_PREFIX).with_legacy_pathname(TOPICS_LEGACY_PATHNAME))?,
            users: backend.versioned(config.versioned(USERS_PREFIX))?,
            leaderboards: backend.versioned(config.versioned(LEADERBOARD_PREFIX))?,
            digest: CredentialDigest::new(&secret),
            topics_key: LogicalKey::new(TOPICS_KEY).map_err(VersionedError::from)?,
            users_key: LogicalKey::new(USERS_KEY).map_err(VersionedError::from)?,
        })
    }

    pub fn backend_name(&self) -> &'static str {
        self.topics.backend_name()
    }
}
