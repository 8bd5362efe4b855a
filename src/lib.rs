//! # restgate
//!
//! A generic, model-agnostic REST gateway over a declarative resource model.
//!
//! ## Features
//!
//! - **Declarative Resources**: collections of typed records with relations,
//!   registered by name at startup
//! - **Generic CRUD Dispatcher**: one set of handlers serves every resource
//! - **Filtering & Pagination**: JSON domain filter trees, `limit`/`page`/
//!   `offset` with deterministic precedence
//! - **Field Projection & Expansion**: dotted field paths recursively inline
//!   related records in place of raw foreign ids
//! - **API-Token Auth**: opaque 256-bit tokens, one live token per identity,
//!   extracted from header, bearer scheme or query parameter
//! - **Pluggable Storage**: resources implement one async capability trait;
//!   an in-memory store ships for development and tests
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use restgate::prelude::*;
//!
//! let users = ResourceDescriptor::new("res.users")
//!     .identity()
//!     .with_active_field("active")
//!     .field("name", FieldDescriptor::new(FieldType::Char).required())
//!     .field("login", FieldDescriptor::new(FieldType::Char).required())
//!     .field(
//!         "password_hash",
//!         FieldDescriptor::new(FieldType::Char).internal(),
//!     );
//!
//! GatewayBuilder::new()
//!     .register(InMemoryCollection::new(users))
//!     .serve()
//!     .await?;
//! ```

pub mod auth;
pub mod config;
pub mod core;
pub mod expand;
pub mod registry;
pub mod server;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core Types ===
    pub use crate::core::{
        error::{AuthError, GatewayError, NotFoundError, QueryError, RequestError},
        filter::{Condition, FilterNode, FilterOp},
        query::QueryPlan,
        record::{Record, RecordId},
        resource::{FieldDescriptor, FieldType, ResourceDescriptor},
        store::ResourceCollection,
    };

    // === Auth ===
    pub use crate::auth::{
        credentials::{CredentialStore, DirectoryCredentials, Identity},
        middleware::CurrentIdentity,
        token::{InMemoryTokenStore, IssuedToken, TokenService, TokenStore},
    };

    // === Registry & Expansion ===
    pub use crate::expand::FieldSelection;
    pub use crate::registry::ResourceRegistry;

    // === Storage ===
    pub use crate::storage::InMemoryCollection;

    // === Config ===
    pub use crate::config::{ExpansionConfig, GatewayConfig, PaginationConfig, TokenConfig};

    // === Server ===
    pub use crate::server::{AppState, GatewayBuilder, build_router, init_tracing};

    // === External dependencies ===
    pub use anyhow::Result;
    pub use async_trait::async_trait;
    pub use chrono::{DateTime, Utc};
    pub use serde::{Deserialize, Serialize};

    // === Axum ===
    pub use axum::{
        Router,
        extract::{Path, State},
        http::HeaderMap,
        routing::{delete, get, post, put},
    };
}
