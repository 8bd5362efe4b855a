//! Typed error handling for the gateway
//!
//! This module provides the error hierarchy used across the crate. Each
//! category maps to one HTTP status class, so handlers can simply return
//! a `GatewayError` and let the `IntoResponse` impl produce the JSON body.
//!
//! # Error Categories
//!
//! - [`AuthError`]: authentication failures (401)
//! - [`QueryError`]: malformed query parameters, domains, projections (400)
//! - [`RequestError`]: malformed bodies and missing path pieces (400)
//! - [`NotFoundError`]: unknown resources, records, databases (404)
//! - `Conflict`: duplicate unique fields on create (409)
//! - `Store`: unexpected store failures surfaced at the dispatcher boundary (500)
//!
//! Every response body is a JSON object with at least an `error` key and a
//! human-readable `message`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt;

use crate::core::record::RecordId;

/// The main error type for the gateway
#[derive(Debug)]
pub enum GatewayError {
    /// Authentication failures
    Auth(AuthError),

    /// Query parameter / domain / projection errors
    Query(QueryError),

    /// Request body and path errors
    Request(RequestError),

    /// Unknown resource, record or database
    NotFound(NotFoundError),

    /// Duplicate unique field on create
    Conflict { message: String },

    /// Unexpected failure from the underlying store
    Store { message: String },
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Auth(e) => write!(f, "{}", e),
            GatewayError::Query(e) => write!(f, "{}", e),
            GatewayError::Request(e) => write!(f, "{}", e),
            GatewayError::NotFound(e) => write!(f, "{}", e),
            GatewayError::Conflict { message } => write!(f, "{}", message),
            GatewayError::Store { message } => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for GatewayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GatewayError::Auth(e) => Some(e),
            GatewayError::Query(e) => Some(e),
            GatewayError::Request(e) => Some(e),
            GatewayError::NotFound(e) => Some(e),
            _ => None,
        }
    }
}

/// Error response structure for HTTP responses
///
/// `error` carries the stable machine-readable code; `message` the human text.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl GatewayError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Auth(_) => StatusCode::UNAUTHORIZED,
            GatewayError::Query(_) => StatusCode::BAD_REQUEST,
            GatewayError::Request(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Conflict { .. } => StatusCode::CONFLICT,
            GatewayError::Store { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the stable error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            GatewayError::Auth(e) => e.error_code(),
            GatewayError::Query(_) => "BAD_REQUEST",
            GatewayError::Request(e) => e.error_code(),
            GatewayError::NotFound(e) => e.error_code(),
            GatewayError::Conflict { .. } => "CONFLICT",
            GatewayError::Store { .. } => "SERVER_ERROR",
        }
    }

    /// Convert to an error response body
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.error_code().to_string(),
            message: self.to_string(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self.to_response());
        (status, body).into_response()
    }
}

// Store failures bubble up from `anyhow::Result` seams; the dispatcher
// converts them wholesale rather than classifying further. Logging here
// guarantees no store failure goes unrecorded.
impl From<anyhow::Error> for GatewayError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("store failure: {:#}", err);
        GatewayError::Store {
            message: err.to_string(),
        }
    }
}

// =============================================================================
// Authentication Errors
// =============================================================================

/// Authentication failures
///
/// Missing and invalid tokens deliberately carry equally uninformative
/// messages so callers cannot probe which tokens exist.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthError {
    /// No token found in header, bearer scheme or query parameter
    TokenRequired,

    /// Token present but unknown, expired or revoked
    InvalidToken,

    /// Login/password pair rejected
    InvalidCredentials,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::TokenRequired => write!(f, "API token required"),
            AuthError::InvalidToken => write!(f, "Invalid API token"),
            AuthError::InvalidCredentials => write!(f, "Invalid credentials"),
        }
    }
}

impl std::error::Error for AuthError {}

impl AuthError {
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::TokenRequired => "TOKEN_REQUIRED",
            AuthError::InvalidToken => "INVALID_TOKEN",
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
        }
    }
}

impl From<AuthError> for GatewayError {
    fn from(err: AuthError) -> Self {
        GatewayError::Auth(err)
    }
}

// =============================================================================
// Query Errors
// =============================================================================

/// Errors raised while building a query plan
#[derive(Debug, Clone, PartialEq)]
pub enum QueryError {
    /// A query parameter failed to parse or carried a disallowed value
    InvalidParameter { name: String, message: String },

    /// The `domain` filter expression could not be parsed
    InvalidDomain { message: String },

    /// A requested field does not exist on the resource
    UnknownField { resource: String, field: String },

    /// Nested expansion paths exceed the configured depth bound
    DepthExceeded { max: usize },

    /// A single expansion level references more target ids than allowed
    TooManyTargets { max: usize },
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::InvalidParameter { name, message } => {
                write!(f, "Invalid parameter '{}': {}", name, message)
            }
            QueryError::InvalidDomain { message } => {
                write!(f, "Invalid domain: {}", message)
            }
            QueryError::UnknownField { resource, field } => {
                write!(f, "Unknown field '{}' on resource '{}'", field, resource)
            }
            QueryError::DepthExceeded { max } => {
                write!(f, "Nested field paths exceed maximum depth of {}", max)
            }
            QueryError::TooManyTargets { max } => {
                write!(f, "Expansion exceeds maximum of {} target ids per level", max)
            }
        }
    }
}

impl std::error::Error for QueryError {}

impl From<QueryError> for GatewayError {
    fn from(err: QueryError) -> Self {
        GatewayError::Query(err)
    }
}

// =============================================================================
// Request Errors
// =============================================================================

/// Errors raised while interpreting a request body or path
#[derive(Debug, Clone, PartialEq)]
pub enum RequestError {
    /// Body is not valid JSON or not an object where one is required
    InvalidBody { message: String },

    /// Update/delete called on the collection path without a record id
    MissingId,

    /// A field the descriptor marks required is absent on create
    MissingField { field: String },

    /// `password` and `confirm_password` differ
    PasswordMismatch,
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::InvalidBody { message } => write!(f, "{}", message),
            RequestError::MissingId => write!(f, "Record id required"),
            RequestError::MissingField { field } => {
                write!(f, "Missing required field '{}'", field)
            }
            RequestError::PasswordMismatch => write!(f, "Passwords do not match"),
        }
    }
}

impl std::error::Error for RequestError {}

impl RequestError {
    pub fn error_code(&self) -> &'static str {
        match self {
            RequestError::InvalidBody { .. } => "BAD_REQUEST",
            RequestError::MissingId => "ID_REQUIRED",
            RequestError::MissingField { .. } => "BAD_REQUEST",
            RequestError::PasswordMismatch => "PASSWORD_MISMATCH",
        }
    }
}

impl From<RequestError> for GatewayError {
    fn from(err: RequestError) -> Self {
        GatewayError::Request(err)
    }
}

// =============================================================================
// Not Found Errors
// =============================================================================

/// Unknown resource, record or logical database
#[derive(Debug, Clone, PartialEq)]
pub enum NotFoundError {
    Resource { name: String },
    Record { resource: String, id: RecordId },
    Database { name: String },
}

impl fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotFoundError::Resource { name } => {
                write!(f, "Resource '{}' not found", name)
            }
            NotFoundError::Record { resource, id } => {
                write!(f, "{} record with id {} not found", resource, id)
            }
            NotFoundError::Database { name } => {
                write!(f, "Database '{}' was not found on this server", name)
            }
        }
    }
}

impl std::error::Error for NotFoundError {}

impl NotFoundError {
    pub fn error_code(&self) -> &'static str {
        match self {
            NotFoundError::Resource { .. } => "RESOURCE_NOT_FOUND",
            NotFoundError::Record { .. } => "RECORD_NOT_FOUND",
            NotFoundError::Database { .. } => "DATABASE_NOT_FOUND",
        }
    }
}

impl From<NotFoundError> for GatewayError {
    fn from(err: NotFoundError) -> Self {
        GatewayError::NotFound(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_errors_return_401() {
        assert_eq!(
            GatewayError::Auth(AuthError::TokenRequired).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GatewayError::Auth(AuthError::InvalidToken).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GatewayError::Auth(AuthError::InvalidCredentials).status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_query_errors_return_400() {
        let err = GatewayError::Query(QueryError::InvalidParameter {
            name: "limit".to_string(),
            message: "must be positive".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_request_errors_return_400() {
        assert_eq!(
            GatewayError::Request(RequestError::MissingId).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::Request(RequestError::PasswordMismatch).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_not_found_errors_return_404() {
        let err = GatewayError::NotFound(NotFoundError::Resource {
            name: "res.unknown".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.error_code(), "RESOURCE_NOT_FOUND");
    }

    #[test]
    fn test_conflict_returns_409() {
        let err = GatewayError::Conflict {
            message: "duplicate login".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.error_code(), "CONFLICT");
    }

    #[test]
    fn test_store_returns_500() {
        let err = GatewayError::Store {
            message: "lock poisoned".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error_code(), "SERVER_ERROR");
    }

    #[test]
    fn test_anyhow_conversion_maps_to_store() {
        let err: GatewayError = anyhow::anyhow!("backend unavailable").into();
        match &err {
            GatewayError::Store { message } => assert_eq!(message, "backend unavailable"),
            other => panic!("Expected Store, got {:?}", other),
        }
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_response_body_has_error_key() {
        let err = GatewayError::Auth(AuthError::InvalidToken);
        let body = err.to_response();
        assert_eq!(body.error, "INVALID_TOKEN");
        assert_eq!(body.message, "Invalid API token");

        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("error").is_some());
        assert!(json.get("message").is_some());
    }

    #[test]
    fn test_missing_and_invalid_token_messages_are_generic() {
        // Neither message may reveal whether a token exists
        let missing = AuthError::TokenRequired.to_string();
        let invalid = AuthError::InvalidToken.to_string();
        assert!(!missing.contains("not found"));
        assert!(!invalid.contains("not found"));
    }

    #[test]
    fn test_into_response_status_propagates() {
        let resp = GatewayError::Request(RequestError::MissingId).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
