//! Shared application state
//!
//! One [`AppState`] is built at startup and cloned into every handler. All
//! of it is read-only after construction except the token store, which
//! synchronizes internally; requests run fully in parallel with no other
//! shared mutable state.

use std::sync::Arc;

use crate::auth::credentials::CredentialStore;
use crate::auth::token::TokenService;
use crate::config::GatewayConfig;
use crate::registry::ResourceRegistry;

/// State shared by all gateway handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub registry: Arc<ResourceRegistry>,
    pub tokens: Arc<TokenService>,
    pub credentials: Arc<dyn CredentialStore>,
}
