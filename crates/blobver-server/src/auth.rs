//! Account records and credential digests.
//!
//! Passwords are never stored. A record keeps a keyed BLAKE3 digest of the
//! username and password, keyed by material derived from the server's
//! `auth_secret`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const KEY_CONTEXT: &str = "blobver 2024 credential digest v1";

/// Computes and checks credential digests.
#[derive(Clone)]
pub struct CredentialDigest {
    key: [u8; 32],
}

impl CredentialDigest {
    pub fn new(secret: &str) -> Self {
        Self {
            key: blake3::derive_key(KEY_CONTEXT, secret.as_bytes()),
        }
    }

    fn hash(&self, username: &str, password: &str) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new_keyed(&self.key);
        hasher.update(&(username.len() as u64).to_le_bytes());
        hasher.update(username.as_bytes());
        hasher.update(password.as_bytes());
        hasher.finalize()
    }

    /// Hex digest for storage.
    pub fn digest(&self, username: &str, password: &str) -> String {
        hex::encode(self.hash(username, password).as_bytes())
    }

    /// Constant-time check of a stored hex digest.
    pub fn verify(&self, username: &str, password: &str, stored: &str) -> bool {
        match blake3::Hash::from_hex(stored) {
            Ok(stored) => stored == self.hash(username, password),
            Err(_) => false,
        }
    }
}

impl std::fmt::Debug for CredentialDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CredentialDigest(..)")
    }
}

/// One registered account as persisted in the users collection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn register(digest: &CredentialDigest, username: &str, password: &str) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            username: username.to_string(),
            password_hash: digest.digest(username, password),
            created_at: Utc::now(),
        }
    }

    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id.clone(),
            username: self.username.clone(),
        }
    }
}

/// What clients see of an account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: String,
    pub username: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_round_trip() {
        let digest = CredentialDigest::new("secret");
        let stored = digest.digest("alice", "pw");
        assert_eq!(stored.len(), 64);
        assert!(digest.verify("alice", "pw", &stored));
        assert!(!digest.verify("alice", "wrong", &stored));
        assert!(!digest.verify("bob", "pw", &stored));
        assert!(!digest.verify("alice", "pw", "not hex"));
    }

    #[test]
    fn digest_depends_on_secret_and_split() {
        let a = CredentialDigest::new("one");
        let b = CredentialDigest::new("two");
        assert_ne!(a.digest("u", "p"), b.digest("u", "p"));
        assert_ne!(a.digest("ab", "c"), a.digest("a", "bc"));
    }

    #[test]
    fn user_record_serializes_camel_case() {
        let digest = CredentialDigest::new("s");
        let user = UserRecord::register(&digest, "alice", "pw");
        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("passwordHash").is_some());
        assert!(value.get("createdAt").is_some());
        assert_eq!(user.public().username, "alice");
        assert!(format!("{digest:?}").ends_with("(..)"));
    }
}
