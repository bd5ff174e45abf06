//! Version blob naming: `{prefix}{key}-{epochMillis}.json`.
//!
//! Listing by `{prefix}{key}-` is a plain string-prefix match, so the listing
//! for key `a` also returns the versions of key `a-b`. [`VersionName::parse`]
//! accepts only names whose remainder after the key is exactly
//! `-{digits}.json`, which separates the two.

use std::fmt;

use crate::error::TypeError;
use crate::key::LogicalKey;
use crate::temporal::VersionStamp;

/// File extension of every version blob.
pub const VERSION_SUFFIX: &str = ".json";

/// A parsed version blob name.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct VersionName {
    pathname: String,
    stamp: VersionStamp,
}

impl VersionName {
    /// Build the name of a new version.
    pub fn new(prefix: &str, key: &LogicalKey, stamp: VersionStamp) -> Self {
        Self {
            pathname: format!("{prefix}{key}-{stamp}{VERSION_SUFFIX}"),
            stamp,
        }
    }

    /// The list prefix shared by every version of `key`.
    pub fn list_prefix(prefix: &str, key: &LogicalKey) -> String {
        format!("{prefix}{key}-")
    }

    /// Parse `pathname` as a version of `key` under `prefix`.
    ///
    /// Returns `None` for anything that is not exactly a version of this key.
    pub fn parse(prefix: &str, key: &LogicalKey, pathname: &str) -> Option<Self> {
        let digits = pathname
            .strip_prefix(prefix)?
            .strip_prefix(key.as_str())?
            .strip_prefix('-')?
            .strip_suffix(VERSION_SUFFIX)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let millis = digits.parse::<u64>().ok()?;
        Some(Self {
            pathname: pathname.to_string(),
            stamp: VersionStamp::from_millis(millis),
        })
    }

    pub fn pathname(&self) -> &str {
        &self.pathname
    }

    pub fn stamp(&self) -> VersionStamp {
        self.stamp
    }
}

impl fmt::Debug for VersionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VersionName({})", self.pathname)
    }
}

impl fmt::Display for VersionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pathname)
    }
}

/// Validate a namespace prefix such as `"leaderboard-store/"`.
///
/// The empty prefix is allowed. Prefixes may contain `/` as a folder
/// separator but must not start with one.
pub fn validate_prefix(prefix: &str) -> Result<(), TypeError> {
    let invalid = |reason: &str| TypeError::InvalidPrefix {
        prefix: prefix.to_string(),
        reason: reason.to_string(),
    };

    if prefix.starts_with('/') {
        return Err(invalid("must not start with '/'"));
    }
    if prefix.contains("..") || prefix.contains("//") {
        return Err(invalid("must not contain '..' or '//'"));
    }
    if prefix
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '\\' | '?' | '#' | '%' | '*'))
    {
        return Err(invalid("contains a forbidden character"));
    }
    Ok(())
}
