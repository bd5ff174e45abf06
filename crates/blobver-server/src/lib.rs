//! HTTP request layer for blobver.
//!
//! Serves the quiz game's topic catalogue, accounts and per-topic
//! leaderboards. Each is a versioned collection: handlers read the latest
//! snapshot, change it in memory and write a new version based on it.

pub mod auth;
pub mod config;
pub mod error;
pub mod handler;
pub mod model;
pub mod router;
pub mod server;
pub mod state;

pub use auth::{CredentialDigest, PublicUser, UserRecord};
pub use config::{BackendKind, BlobverConfig, ObjectBackend, AUTH_SECRET_ENV};
pub use error::{ApiError, ApiResult, ServerError, ServerResult};
pub use model::{LeaderboardEntry, Topic, LEADERBOARD_LIMIT};
pub use server::BlobverServer;
pub use state::{AppState, SharedState};
