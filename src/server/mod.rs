//! HTTP server: state, routes, handlers and the builder

pub mod builder;
pub mod handlers;
pub mod routes;
pub mod state;

pub use builder::{GatewayBuilder, init_tracing};
pub use routes::build_router;
pub use state::AppState;
