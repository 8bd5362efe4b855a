//! Credential verification against an external identity store
//!
//! The gateway never stores plaintext passwords: the dispatcher hashes the
//! `password` field of identity records into `password_hash` with argon2
//! before insert, and login verifies against that hash.

use anyhow::Result;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::password_hash::rand_core::OsRng;
use argon2::Argon2;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::core::filter::{Condition, FilterNode, FilterOp};
use crate::core::record::RecordId;
use crate::core::store::ResourceCollection;

/// Resolved principal attached to authenticated requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: RecordId,
    pub login: String,
    pub name: String,
}

/// Narrow seam to the user/credential store
///
/// `Ok(None)` covers unknown logins and wrong passwords alike; callers must
/// not be able to tell the two apart.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn authenticate(&self, login: &str, password: &str) -> Result<Option<Identity>>;
}

/// Hash a password for storage
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;
    Ok(hash.to_string())
}

/// Verify a password against a stored hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Credential store backed by the registered identity resource
///
/// Looks the login up against both the `login` and `email` fields, the same
/// disjunction the login endpoint of the original directory used.
pub struct DirectoryCredentials {
    users: Arc<dyn ResourceCollection>,
}

impl DirectoryCredentials {
    pub fn new(users: Arc<dyn ResourceCollection>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl CredentialStore for DirectoryCredentials {
    async fn authenticate(&self, login: &str, password: &str) -> Result<Option<Identity>> {
        if login.is_empty() || password.is_empty() {
            return Ok(None);
        }

        let filter = FilterNode::Or(vec![
            FilterNode::Condition(Condition::new("login", FilterOp::Eq, json!(login))),
            FilterNode::Condition(Condition::new("email", FilterOp::Eq, json!(login))),
        ]);
        // Archived identities cannot log in
        let hits = self.users.search(&filter, 1, 0, true).await?;
        let Some(user) = hits.first() else {
            return Ok(None);
        };

        let Some(hash) = user.get("password_hash").and_then(Value::as_str) else {
            return Ok(None);
        };
        if !verify_password(password, hash) {
            return Ok(None);
        }

        let Some(id) = user.id() else {
            return Ok(None);
        };
        let login = user
            .get("login")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let name = user.display_name(&self.users.descriptor().display_field);
        Ok(Some(Identity { id, login, name }))
    }
}

/// Credential store that rejects every login
///
/// Default when no identity resource is registered.
pub struct NoCredentialStore;

#[async_trait]
impl CredentialStore for NoCredentialStore {
    async fn authenticate(&self, _login: &str, _password: &str) -> Result<Option<Identity>> {
        Ok(None)
    }
}
