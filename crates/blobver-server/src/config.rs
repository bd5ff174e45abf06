use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use blobver_store::{
    FsObjectStore, HttpObjectStore, HttpStoreConfig, InMemoryObjectStore, ObjectStore, StoreError, DEFAULT_API_URL,
    DEFAULT_API_VERSION, DEFAULT_TOKEN_ENV,
};
use blobver_versioned::{Durability, VersionedConfig, VersionedStore, DEFAULT_RETENTION};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ServerError, ServerResult};

/// Environment variable that overrides `auth_secret`.
pub const AUTH_SECRET_ENV: &str = "BLOBVER_AUTH_SECRET";

/// Top-level configuration, usually read from `blobver.toml`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BlobverConfig {
    pub bind_addr: SocketAddr,
    pub backend: BackendKind,
    pub http: HttpSection,
    pub fs: FsSection,
    pub store: StoreSection,
    /// Key material for credential digests.
    pub auth_secret: Option<String>,
}

impl Default for BlobverConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            backend: BackendKind::Http,
            http: HttpSection::default(),
            fs: FsSection::default(),
            store: StoreSection::default(),
            auth_secret: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// The remote blob service.
    #[default]
    Http,
    /// A local directory.
    Fs,
    /// Process memory; lost on exit.
    Memory,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpSection {
    pub api_url: String,
    pub api_version: String,
    /// Name of the environment variable holding the access token.
    pub token_env: String,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            token_env: DEFAULT_TOKEN_ENV.to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FsSection {
    pub root: PathBuf,
}

impl Default for FsSection {
    fn default() -> Self {
        Self {
            root: PathBuf::from(".blobver"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSection {
    pub retention: usize,
    pub durability: Durability,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            retention: DEFAULT_RETENTION,
            durability: Durability::Enforced,
        }
    }
}

/// The object store a configuration resolves to.
#[derive(Clone)]
pub enum ObjectBackend {
    Ready(Arc<dyn ObjectStore>),
    /// No usable backend, e.g. the token variable is unset.
    Unconfigured { reason: String },
}

impl ObjectBackend {
    /// Build a versioned store over this backend.
    pub fn versioned(&self, config: VersionedConfig) -> ServerResult<VersionedStore> {
        let store = match self {
            Self::Ready(objects) => VersionedStore::new(objects.clone(), config)?,
            Self::Unconfigured { reason } => VersionedStore::unconfigured(reason.clone(), config)?,
        };
        Ok(store)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Ready(objects) => objects.backend_name(),
            Self::Unconfigured { .. } => "unconfigured",
        }
    }
}

impl BlobverConfig {
    /// Parse a TOML document. Missing fields take their defaults.
    pub fn from_toml_str(text: &str) -> ServerResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("reading {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> ServerResult<()> {
        if self.store.retention == 0 {
            return Err(ServerError::Config("store.retention must be at least 1".into()));
        }
        if self.backend == BackendKind::Http && self.http.token_env.is_empty() {
            return Err(ServerError::Config("http.token_env must name an environment variable".into()));
        }
        Ok(())
    }

    /// The digest key material: the environment override, then the file.
    pub fn auth_secret(&self) -> Option<String> {
        std::env::var(AUTH_SECRET_ENV)
            .ok()
            .filter(|s| !s.is_empty())
            .or_else(|| self.auth_secret.clone())
    }

    /// Versioned store settings for `prefix` with this file's retention and
    /// durability.
    pub fn versioned(&self, prefix: &str) -> VersionedConfig {
        VersionedConfig::new(prefix)
            .with_retention(self.store.retention)
            .with_durability(self.store.durability)
    }

    /// Resolve the configured object store.
    ///
    /// A missing token yields [`ObjectBackend::Unconfigured`] rather than an
    /// error, so the server still starts and reports the problem per request.
    pub fn object_backend(&self) -> ServerResult<ObjectBackend> {
        match self.backend {
            BackendKind::Memory => Ok(ObjectBackend::Ready(Arc::new(InMemoryObjectStore::new()))),
            BackendKind::Fs => {
                let store = FsObjectStore::open(&self.fs.root)
                    .map_err(|e| ServerError::Config(format!("opening {}: {e}", self.fs.root.display())))?;
                Ok(ObjectBackend::Ready(Arc::new(store)))
            }
            BackendKind::Http => match HttpStoreConfig::from_env(&self.http.token_env) {
                Ok(http) => {
                    let http = http
                        .with_api_url(&self.http.api_url)
                        .with_api_version(&self.http.api_version);
                    let store = HttpObjectStore::new(http).map_err(|e| ServerError::Config(e.to_string()))?;
                    Ok(ObjectBackend::Ready(Arc::new(store)))
                }
                Err(StoreError::MissingCredential(detail)) => {
                    warn!(%detail, "object store token missing, collections are read-only and empty");
                    Ok(ObjectBackend::Unconfigured {
                        reason: format!("object store credential missing: {detail}"),
                    })
                }
                Err(e) => Err(ServerError::Config(e.to_string())),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = BlobverConfig::default();
        assert_eq!(c.bind_addr, "127.0.0.1:3000".parse::<SocketAddr>().unwrap());
        assert_eq!(c.backend, BackendKind::Http);
        assert_eq!(c.http.token_env, "BLOB_READ_WRITE_TOKEN");
        assert_eq!(c.store.retention, 3);
        assert_eq!(c.store.durability, Durability::Enforced);
        assert!(c.auth_secret.is_none());
    }

    #[test]
    fn parses_partial_toml() {
        let c = BlobverConfig::from_toml_str(
            r#"
            bind_addr = "0.0.0.0:8080"
            backend = "fs"

            [fs]
            root = "/var/lib/blobver"

            [store]
            durability = "best-effort"
            "#,
        )
        .unwrap();
        assert_eq!(c.bind_addr.port(), 8080);
        assert_eq!(c.backend, BackendKind::Fs);
        assert_eq!(c.fs.root, PathBuf::from("/var/lib/blobver"));
        assert_eq!(c.store.retention, 3);
        assert_eq!(c.store.durability, Durability::BestEffort);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(BlobverConfig::from_toml_str("backend = \"s3\"").is_err());
        assert!(BlobverConfig::from_toml_str("[store]\nretention = 0").is_err());
        assert!(BlobverConfig::from_toml_str("unknown = 1").is_err());
    }

    #[test]
    fn missing_token_resolves_to_unconfigured() {
        let mut c = BlobverConfig::default();
        c.http.token_env = "BLOBVER_TEST_TOKEN_THAT_IS_NEVER_SET".into();
        let backend = c.object_backend().unwrap();
        assert_eq!(backend.name(), "unconfigured");
        let store = backend.versioned(c.versioned("users-store/")).unwrap();
        assert!(!store.is_configured());
    }

    #[test]
    fn fs_backend_opens_root() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = BlobverConfig::default();
        c.backend = BackendKind::Fs;
        c.fs.root = dir.path().join("blobs");
        let backend = c.object_backend().unwrap();
        assert_eq!(backend.name(), "fs");
        assert!(c.fs.root.is_dir());
    }

    #[test]
    fn versioned_settings_follow_store_section() {
        let mut c = BlobverConfig::default();
        c.store.retention = 5;
        let v = c.versioned("leaderboard-store/");
        assert_eq!(v.prefix, "leaderboard-store/");
        assert_eq!(v.retention, 5);
        assert!(v.legacy_pathname.is_none());
    }
}
