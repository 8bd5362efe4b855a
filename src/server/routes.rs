//! Route table for the gateway
//!
//! Session and info routes are open; everything under a resource name runs
//! through the API-key middleware first.

use axum::routing::{get, post};
use axum::{Router, middleware};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::middleware::require_api_key;
use crate::server::handlers::{
    create_record, delete_record, list_records, login, logout, read_record, reject_missing_id,
    resource_fields, service_info, update_record,
};
use crate::server::state::AppState;

/// Build the full gateway router
pub fn build_router(state: AppState) -> Router {
    let open = Router::new()
        .route("/resources", get(service_info))
        .route("/sessions", post(login))
        .route("/sessions/logout", post(logout).get(logout));

    let protected = Router::new()
        .route("/resources/{name}/fields", get(resource_fields))
        .route(
            "/resources/{name}",
            get(list_records)
                .post(create_record)
                .put(reject_missing_id)
                .delete(reject_missing_id),
        )
        .route(
            "/resources/{name}/{id}",
            get(read_record).put(update_record).delete(delete_record),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    open.merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
