//! GatewayBuilder for fluent API to assemble and serve the gateway

use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::auth::credentials::{CredentialStore, DirectoryCredentials, NoCredentialStore};
use crate::auth::token::{InMemoryTokenStore, TokenService, TokenStore};
use crate::config::GatewayConfig;
use crate::core::store::ResourceCollection;
use crate::registry::ResourceRegistry;
use crate::server::routes::build_router;
use crate::server::state::AppState;

/// Builder for creating the gateway with registered resources
///
/// # Example
///
/// ```ignore
/// let app = GatewayBuilder::new()
///     .with_config(GatewayConfig::from_yaml_file("gateway.yaml")?)
///     .register(InMemoryCollection::new(users_descriptor()))
///     .register(InMemoryCollection::new(partners_descriptor()))
///     .build();
/// ```
pub struct GatewayBuilder {
    config: GatewayConfig,
    registry: ResourceRegistry,
    token_store: Option<Arc<dyn TokenStore>>,
    credentials: Option<Arc<dyn CredentialStore>>,
}

impl GatewayBuilder {
    /// Create a new GatewayBuilder with default configuration
    pub fn new() -> Self {
        Self {
            config: GatewayConfig::default(),
            registry: ResourceRegistry::new(),
            token_store: None,
            credentials: None,
        }
    }

    /// Replace the configuration
    pub fn with_config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a resource collection under its descriptor's name
    pub fn register(mut self, collection: impl ResourceCollection + 'static) -> Self {
        self.registry.register(Arc::new(collection));
        self
    }

    /// Register an already-shared resource collection
    pub fn register_arc(mut self, collection: Arc<dyn ResourceCollection>) -> Self {
        self.registry.register(collection);
        self
    }

    /// Use a custom token store (defaults to in-memory)
    pub fn with_token_store(mut self, store: impl TokenStore + 'static) -> Self {
        self.token_store = Some(Arc::new(store));
        self
    }

    /// Use a custom credential store
    ///
    /// Without one, logins verify against the registered identity resource;
    /// if there is none, every login is rejected.
    pub fn with_credentials(mut self, credentials: impl CredentialStore + 'static) -> Self {
        self.credentials = Some(Arc::new(credentials));
        self
    }

    /// Assemble the shared application state
    pub fn build_state(self) -> AppState {
        let registry = Arc::new(self.registry);
        let token_store = self
            .token_store
            .unwrap_or_else(|| Arc::new(InMemoryTokenStore::new()));
        let tokens = Arc::new(TokenService::new(
            token_store,
            self.config.tokens.ttl_seconds,
        ));
        let credentials: Arc<dyn CredentialStore> = match self.credentials {
            Some(credentials) => credentials,
            None => match registry.identity_resource() {
                Some(users) => Arc::new(DirectoryCredentials::new(users)),
                None => Arc::new(NoCredentialStore),
            },
        };

        AppState {
            config: Arc::new(self.config),
            registry,
            tokens,
            credentials,
        }
    }

    /// Build the axum router with all gateway routes
    pub fn build(self) -> Router {
        build_router(self.build_state())
    }

    /// Serve the gateway with graceful shutdown
    ///
    /// Binds to the configured address, serves requests and handles SIGTERM
    /// and Ctrl+C for graceful shutdown.
    pub async fn serve(self) -> Result<()> {
        let addr = self.config.bind_addr.clone();
        let app = self.build();
        let listener = TcpListener::bind(&addr).await?;

        tracing::info!("Gateway listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Gateway shutdown complete");
        Ok(())
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Initialize tracing with the standard env-filter setup
///
/// Call once from the binary embedding the gateway; respects `RUST_LOG`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resource::{FieldDescriptor, FieldType, ResourceDescriptor};
    use crate::storage::InMemoryCollection;

    fn partners() -> InMemoryCollection {
        InMemoryCollection::new(
            ResourceDescriptor::new("res.partner")
                .field("name", FieldDescriptor::new(FieldType::Char)),
        )
    }

    fn users() -> InMemoryCollection {
        InMemoryCollection::new(
            ResourceDescriptor::new("res.users")
                .identity()
                .field("login", FieldDescriptor::new(FieldType::Char)),
        )
    }

    #[test]
    fn test_build_state_registers_resources() {
        let state = GatewayBuilder::new()
            .register(partners())
            .register(users())
            .build_state();
        assert_eq!(state.registry.names().len(), 2);
        assert!(state.registry.get("res.partner").is_some());
    }

    #[test]
    fn test_build_state_defaults() {
        let state = GatewayBuilder::new().register(partners()).build_state();
        assert_eq!(state.config.pagination.default_limit, 80);
    }

    #[test]
    fn test_with_config() {
        let mut config = GatewayConfig::default();
        config.pagination.default_limit = 10;
        let state = GatewayBuilder::new().with_config(config).build_state();
        assert_eq!(state.config.pagination.default_limit, 10);
    }

    #[test]
    fn test_build_produces_router() {
        let _router = GatewayBuilder::new()
            .register(partners())
            .register(users())
            .build();
    }

    #[test]
    fn test_fluent_chaining_full_pipeline() {
        let _router = GatewayBuilder::new()
            .with_config(GatewayConfig::default_config())
            .with_token_store(InMemoryTokenStore::new())
            .register(partners())
            .register(users())
            .build();
    }
}
