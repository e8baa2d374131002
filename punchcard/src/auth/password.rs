//! User directory: credential records and password verification.
//!
//! Passwords are stored as salted SHA-256 digests under `/user/{username}`
//! in the same byte store the pack repository uses. A login for an unknown
//! username registers it on the spot; the service is self-enrolling.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::AuthError;
use crate::store::Store;

#[derive(Debug, Serialize, Deserialize)]
struct UserRecord {
    username: String,
    /// Base64-encoded random salt.
    salt: String,
    /// Base64-encoded SHA-256 of salt || password.
    password_hash: String,
}

/// Outcome of a successful login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Login {
    Authenticated,
    /// First login for this username; the account was just created.
    Registered,
}

pub struct UserDirectory {
    store: Arc<dyn Store>,
}

fn user_key(username: &str) -> String {
    format!("/user/{username}")
}

fn hash_password(salt: &[u8], password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    BASE64.encode(hasher.finalize())
}

impl UserDirectory {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Verify `password` for `username`, creating the account on first login.
    pub fn login(&self, username: &str, password: &str) -> Result<Login, AuthError> {
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let Some(bytes) = self.store.get(&user_key(username))? else {
            self.register(username, password)?;
            tracing::info!(%username, "registered new user");
            return Ok(Login::Registered);
        };

        let record: UserRecord =
            serde_json::from_slice(&bytes).map_err(AuthError::CorruptRecord)?;
        let salt = BASE64
            .decode(&record.salt)
            .map_err(|_| AuthError::InvalidCredentials)?;

        if hash_password(&salt, password) != record.password_hash {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(Login::Authenticated)
    }

    fn register(&self, username: &str, password: &str) -> Result<(), AuthError> {
        let salt = *uuid::Uuid::new_v4().as_bytes();
        let record = UserRecord {
            username: username.to_string(),
            salt: BASE64.encode(salt),
            password_hash: hash_password(&salt, password),
        };

        let bytes = serde_json::to_vec(&record).map_err(AuthError::CorruptRecord)?;
        self.store.set(&user_key(username), &bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn directory() -> UserDirectory {
        UserDirectory::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn first_login_registers() {
        let dir = directory();
        assert_eq!(dir.login("alice", "hunter2").unwrap(), Login::Registered);
    }

    #[test]
    fn second_login_authenticates() {
        let dir = directory();
        dir.login("alice", "hunter2").unwrap();
        assert_eq!(dir.login("alice", "hunter2").unwrap(), Login::Authenticated);
    }

    #[test]
    fn wrong_password_is_rejected() {
        let dir = directory();
        dir.login("alice", "hunter2").unwrap();

        assert!(matches!(
            dir.login("alice", "wrong"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn empty_credentials_are_rejected() {
        let dir = directory();
        assert!(matches!(
            dir.login("", "hunter2"),
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            dir.login("alice", ""),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn same_password_different_users_hash_differently() {
        let store = Arc::new(MemoryStore::new());
        let dir = UserDirectory::new(Arc::clone(&store) as Arc<dyn Store>);
        dir.login("alice", "hunter2").unwrap();
        dir.login("bob", "hunter2").unwrap();

        let alice = store.get("/user/alice").unwrap().unwrap();
        let bob = store.get("/user/bob").unwrap().unwrap();
        let alice: serde_json::Value = serde_json::from_slice(&alice).unwrap();
        let bob: serde_json::Value = serde_json::from_slice(&bob).unwrap();
        assert_ne!(alice["password_hash"], bob["password_hash"]);
    }
}
