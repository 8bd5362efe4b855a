//! Token-based authentication middleware
//!
//! Every protected route runs through [`require_api_key`]: the token is
//! pulled from the request (custom header, bearer scheme or query
//! parameter — first match wins), resolved through the token service, and
//! the identity is bound to the request's extensions for the rest of its
//! lifetime. The binding is request-scoped; nothing is cached across
//! requests.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::HeaderMap;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;

use crate::core::error::{AuthError, GatewayError};
use crate::core::record::RecordId;
use crate::server::AppState;

/// Identity resolved by the auth middleware, bound to one request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurrentIdentity {
    pub identity_id: RecordId,
}

impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentIdentity>()
            .copied()
            .ok_or_else(|| AuthError::TokenRequired.into())
    }
}

/// Extract the raw API token from a request
///
/// Precedence, first match wins:
/// 1. `X-API-Key` header
/// 2. `Authorization: Bearer <token>` (case-insensitive prefix)
/// 3. `api_key` query parameter
pub fn extract_api_key(headers: &HeaderMap, query: Option<&str>) -> Option<String> {
    if let Some(key) = headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        let key = key.trim();
        if !key.is_empty() {
            return Some(key.to_string());
        }
    }

    if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok())
        && auth.len() > 7
        && auth[..7].eq_ignore_ascii_case("bearer ")
    {
        let key = auth[7..].trim();
        if !key.is_empty() {
            return Some(key.to_string());
        }
    }

    query_param(query?, "api_key")
}

/// Minimal query-string lookup; token values are plain hex and need no
/// percent-decoding
fn query_param(query: &str, name: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name && !value.is_empty()).then(|| value.to_string())
    })
}

/// Middleware guarding all resource routes
///
/// Missing and invalid tokens both map to 401 with deliberately generic
/// messages; nothing about registered resources leaks before auth passes.
pub async fn require_api_key(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    let Some(token) = extract_api_key(request.headers(), request.uri().query()) else {
        tracing::warn!("auth: request without API token");
        return Err(AuthError::TokenRequired.into());
    };

    match state.tokens.validate(&token).await? {
        Some(identity_id) => {
            tracing::debug!(identity_id, "auth: token accepted");
            request
                .extensions_mut()
                .insert(CurrentIdentity { identity_id });
            Ok(next.run(request).await)
        }
        None => {
            tracing::warn!(
                "auth: invalid API token {}...",
                &token[..token.len().min(8)]
            );
            Err(AuthError::InvalidToken.into())
        }
    }
}
