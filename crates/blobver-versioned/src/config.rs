use blobver_types::{validate_prefix, VERSION_SUFFIX};
use serde::{Deserialize, Serialize};

use crate::error::{VersionedError, VersionedResult};

/// Number of versions kept per key unless configured otherwise.
pub const DEFAULT_RETENTION: usize = 3;

/// What a failed create of a new version means for the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Durability {
    /// The failure is returned as `VersionedError::Write`.
    #[default]
    Enforced,
    /// The failure is logged and the write reports `WriteOutcome::Skipped`.
    /// For local development against a flaky or absent backend only.
    BestEffort,
}

/// Settings of one versioned collection namespace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VersionedConfig {
    /// Namespace prepended to every version name, e.g. `"users-store/"`.
    pub prefix: String,
    /// Versions kept per key after each successful write. At least 1.
    pub retention: usize,
    pub durability: Durability,
    /// Fixed pathname of a pre-versioning single-file blob, read only when a
    /// key has no versions yet. Never written or pruned.
    pub legacy_pathname: Option<String>,
}

impl Default for VersionedConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            retention: DEFAULT_RETENTION,
            durability: Durability::Enforced,
            legacy_pathname: None,
        }
    }
}

impl VersionedConfig {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_durability(mut self, durability: Durability) -> Self {
        self.durability = durability;
        self
    }

    pub fn with_legacy_pathname(mut self, pathname: impl Into<String>) -> Self {
        self.legacy_pathname = Some(pathname.into());
        self
    }

    /// Check the settings before a store is built from them.
    pub fn validate(&self) -> VersionedResult<()> {
        validate_prefix(&self.prefix)?;
        if self.retention == 0 {
            return Err(VersionedError::Configuration(
                "retention must keep at least one version".into(),
            ));
        }
        if let Some(legacy) = &self.legacy_pathname {
            if legacy.is_empty() {
                return Err(VersionedError::Configuration(
                    "legacy pathname must not be empty".into(),
                ));
            }
            // A legacy name inside the version namespace would be pruned.
            let stem = legacy
                .strip_prefix(self.prefix.as_str())
                .and_then(|rest| rest.strip_suffix(VERSION_SUFFIX));
            if let Some(stem) = stem {
                if stem
                    .rsplit_once('-')
                    .is_some_and(|(_, digits)| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
                {
                    return Err(VersionedError::Configuration(format!(
                        "legacy pathname {legacy:?} looks like a version name"
                    )));
                }
            }
        }
        Ok(())
    }
}
