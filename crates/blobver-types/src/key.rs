//! Logical key validation.
//!
//! A logical key names one independent document collection. Keys end up
//! inside blob pathnames and request URLs, so they are restricted to a
//! conservative character set:
//! - Must be non-empty and at most [`MAX_KEY_LEN`] bytes
//! - Must not contain whitespace, control characters, `/`, `\`, `?`, `#`,
//!   `%` or `*`
//! - Must not contain `..`
//! - Must not start with `.` or `-`

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Maximum key length in bytes.
pub const MAX_KEY_LEN: usize = 200;

/// Characters that are forbidden anywhere in a key.
const FORBIDDEN_CHARS: &[char] = &['/', '\\', '?', '#', '%', '*'];

/// A validated logical key.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LogicalKey(String);

impl LogicalKey {
    /// Validate and wrap a key.
    ///
    /// ```
    /// use blobver_types::LogicalKey;
    ///
    /// assert!(LogicalKey::new("topics").is_ok());
    /// assert!(LogicalKey::new("custom-1700000000").is_ok());
    /// assert!(LogicalKey::new("").is_err());
    /// assert!(LogicalKey::new("a/b").is_err());
    /// ```
    pub fn new(key: impl Into<String>) -> Result<Self, TypeError> {
        let key = key.into();
        validate_key(&key)?;
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Validate a key, returning `Ok(())` if valid.
pub fn validate_key(key: &str) -> Result<(), TypeError> {
    let invalid = |reason: String| TypeError::InvalidKey {
        key: key.to_string(),
        reason,
    };

    if key.is_empty() {
        return Err(invalid("key must not be empty".into()));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(invalid(format!("longer than {MAX_KEY_LEN} bytes")));
    }
    if let Some(ch) = key
        .chars()
        .find(|c| c.is_whitespace() || c.is_control() || FORBIDDEN_CHARS.contains(c))
    {
        return Err(invalid(format!("contains forbidden character: {ch:?}")));
    }
    if key.contains("..") {
        return Err(invalid("must not contain '..'".into()));
    }
    if key.starts_with('.') || key.starts_with('-') {
        return Err(invalid("must not start with '.' or '-'".into()));
    }
    Ok(())
}

impl fmt::Debug for LogicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LogicalKey({})", self.0)
    }
}

impl fmt::Display for LogicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LogicalKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for LogicalKey {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for LogicalKey {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<LogicalKey> for String {
    fn from(key: LogicalKey) -> Self {
        key.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_keys() {
        for key in ["topics", "users", "prefectures", "custom-1700000000", "日本の都道府県", "a_b.c"] {
            assert!(LogicalKey::new(key).is_ok(), "{key} should be valid");
        }
    }

    #[test]
    fn empty_key_is_rejected() {
        let err = LogicalKey::new("").unwrap_err();
        assert!(matches!(err, TypeError::InvalidKey { .. }));
    }

    #[test]
    fn forbidden_characters_are_rejected() {
        for key in ["a/b", "a\\b", "a?b", "a#b", "a%20", "a*", "a b", "a\tb", "a\nb"] {
            assert!(LogicalKey::new(key).is_err(), "{key:?} should be invalid");
        }
    }

    #[test]
    fn traversal_and_leading_marks_are_rejected() {
        assert!(LogicalKey::new("a..b").is_err());
        assert!(LogicalKey::new(".hidden").is_err());
        assert!(LogicalKey::new("-leading").is_err());
    }

    #[test]
    fn overlong_key_is_rejected() {
        assert!(LogicalKey::new("k".repeat(MAX_KEY_LEN)).is_ok());
        assert!(LogicalKey::new("k".repeat(MAX_KEY_LEN + 1)).is_err());
    }

    #[test]
    fn serde_validates_on_deserialize() {
        let key: LogicalKey = serde_json::from_str("\"topics\"").unwrap();
        assert_eq!(key.as_str(), "topics");
        assert!(serde_json::from_str::<LogicalKey>("\"a/b\"").is_err());
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"topics\"");
    }

    #[test]
    fn parse_and_display() {
        let key: LogicalKey = "leaderboard".parse().unwrap();
        assert_eq!(key.to_string(), "leaderboard");
        assert_eq!(format!("{key:?}"), "LogicalKey(leaderboard)");
    }
}
