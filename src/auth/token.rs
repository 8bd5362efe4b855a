//! API token issuance and validation
//!
//! Tokens are opaque 256-bit random hex strings bound 1:1 to an identity:
//! issuing a new token for an identity overwrites the previous one, so at
//! most one token per identity is ever live. Each token carries metadata —
//! issued-at, optional expiry, revocation flag — checked at validation time.
//!
//! Lookup compares secrets with a constant-time XOR-fold so validation time
//! does not depend on how many leading bytes of a guess match.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::core::record::RecordId;

/// Number of random bytes per token secret (hex-encoded to 64 chars)
const SECRET_BYTES: usize = 32;

/// One issued token and its metadata
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedToken {
    pub secret: String,
    pub identity_id: RecordId,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked: bool,
}

impl IssuedToken {
    /// Whether the token is still valid at `now`
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && self.expires_at.is_none_or(|expiry| now < expiry)
    }
}

/// Generate a fresh token secret from the OS CSPRNG
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Constant-time string comparison
///
/// Standard `==` short-circuits on the first differing byte; XOR-folding all
/// byte pairs keeps comparison time independent of where strings differ. The
/// length check leaks only the length, and all secrets are 64 hex chars.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes()
        .iter()
        .zip(b.as_bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Persistence seam for issued tokens
///
/// `put` must atomically replace any previous token of the same identity.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Persist a token, replacing the identity's previous one
    async fn put(&self, token: IssuedToken) -> Result<()>;

    /// Exact-match lookup by secret
    async fn find(&self, secret: &str) -> Result<Option<IssuedToken>>;

    /// The identity's current token, if any
    async fn find_for_identity(&self, identity_id: RecordId) -> Result<Option<IssuedToken>>;

    /// Mark the token with this secret revoked; unknown secrets are a no-op
    async fn revoke(&self, secret: &str) -> Result<()>;

    /// Drop the identity's token entirely (identity deletion cascade)
    async fn remove_for_identity(&self, identity_id: RecordId) -> Result<()>;
}

/// In-memory token store
///
/// Keyed by identity id, which structurally enforces the single active
/// token per identity.
#[derive(Default)]
pub struct InMemoryTokenStore {
    tokens: Arc<RwLock<HashMap<RecordId, IssuedToken>>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn put(&self, token: IssuedToken) -> Result<()> {
        let mut tokens = self
            .tokens
            .write()
            .map_err(|e| anyhow::anyhow!("Failed to acquire write lock: {}", e))?;
        tokens.insert(token.identity_id, token);
        Ok(())
    }

    async fn find(&self, secret: &str) -> Result<Option<IssuedToken>> {
        let tokens = self
            .tokens
            .read()
            .map_err(|e| anyhow::anyhow!("Failed to acquire read lock: {}", e))?;
        Ok(tokens
            .values()
            .find(|t| constant_time_eq(&t.secret, secret))
            .cloned())
    }

    async fn find_for_identity(&self, identity_id: RecordId) -> Result<Option<IssuedToken>> {
        let tokens = self
            .tokens
            .read()
            .map_err(|e| anyhow::anyhow!("Failed to acquire read lock: {}", e))?;
        Ok(tokens.get(&identity_id).cloned())
    }

    async fn revoke(&self, secret: &str) -> Result<()> {
        let mut tokens = self
            .tokens
            .write()
            .map_err(|e| anyhow::anyhow!("Failed to acquire write lock: {}", e))?;
        if let Some(token) = tokens
            .values_mut()
            .find(|t| constant_time_eq(&t.secret, secret))
        {
            token.revoked = true;
        }
        Ok(())
    }

    async fn remove_for_identity(&self, identity_id: RecordId) -> Result<()> {
        let mut tokens = self
            .tokens
            .write()
            .map_err(|e| anyhow::anyhow!("Failed to acquire write lock: {}", e))?;
        tokens.remove(&identity_id);
        Ok(())
    }
}

/// Token issuer and validator
pub struct TokenService {
    store: Arc<dyn TokenStore>,
    ttl: Option<Duration>,
}

impl TokenService {
    pub fn new(store: Arc<dyn TokenStore>, ttl_seconds: Option<i64>) -> Self {
        Self {
            store,
            ttl: ttl_seconds.map(Duration::seconds),
        }
    }

    /// Issue a fresh token for the identity, overwriting any previous one
    ///
    /// Persists synchronously before returning; concurrent issuance for the
    /// same identity resolves to last-writer-wins under the store's lock.
    pub async fn issue(&self, identity_id: RecordId) -> Result<IssuedToken> {
        let issued_at = Utc::now();
        let token = IssuedToken {
            secret: generate_secret(),
            identity_id,
            issued_at,
            expires_at: self.ttl.map(|ttl| issued_at + ttl),
            revoked: false,
        };
        self.store.put(token.clone()).await?;
        Ok(token)
    }

    /// Return the identity's live token, issuing one if none exists
    pub async fn ensure(&self, identity_id: RecordId) -> Result<IssuedToken> {
        if let Some(existing) = self.store.find_for_identity(identity_id).await?
            && existing.is_live(Utc::now())
        {
            return Ok(existing);
        }
        self.issue(identity_id).await
    }

    /// Resolve a token back to its identity
    ///
    /// Returns `None` for empty, unknown, expired and revoked tokens alike.
    pub async fn validate(&self, secret: &str) -> Result<Option<RecordId>> {
        if secret.is_empty() {
            return Ok(None);
        }
        let Some(token) = self.store.find(secret).await? else {
            return Ok(None);
        };
        if !token.is_live(Utc::now()) {
            return Ok(None);
        }
        Ok(Some(token.identity_id))
    }

    /// Revoke the token with this secret (logout)
    pub async fn revoke(&self, secret: &str) -> Result<()> {
        self.store.revoke(secret).await
    }

    /// Drop the identity's token (identity deletion cascade)
    pub async fn revoke_for_identity(&self, identity_id: RecordId) -> Result<()> {
        self.store.remove_for_identity(identity_id).await
    }
}
