//! HTTP handlers: sessions, metadata and the generic CRUD dispatcher
//!
//! The dispatcher resolves the resource by name, builds a query plan,
//! executes CRUD against the registered collection and shapes the JSON
//! envelope. Validation errors are raised here, close to the boundary;
//! unexpected store failures convert to a generic 500 on the way out and
//! never crash the handler.

use axum::Json;
use axum::extract::{Path, Query, RawQuery, State};
use axum::http::{HeaderMap, StatusCode};
use serde_json::{Value, json};
use std::collections::HashMap;

use crate::auth::credentials::hash_password;
use crate::auth::middleware::{CurrentIdentity, extract_api_key};
use crate::core::error::{
    AuthError, GatewayError, NotFoundError, QueryError, RequestError,
};
use crate::core::filter::{Condition, FilterNode};
use crate::core::query::{QueryPlan, merge_params, total_pages};
use crate::core::record::{Record, RecordId};
use crate::core::resource::ResourceDescriptor;
use crate::core::store::ResourceCollection;
use crate::expand::expand_records;
use crate::server::state::AppState;

// =============================================================================
// Info & sessions
// =============================================================================

/// Liveness/info envelope, served without authentication
pub async fn service_info() -> Json<Value> {
    Json(json!({
        "status": "online",
        "message": "restgate REST gateway is active",
        "endpoints": [
            "/resources",
            "/sessions",
            "/sessions/logout",
            "/resources/{name}/fields",
            "/resources/{name}",
            "/resources/{name}/{id}",
        ],
    }))
}

/// Login: verify credentials and hand out the identity's API token
pub async fn login(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<Value>, GatewayError> {
    let data = parse_body_object(&body)?;

    let login = first_string(&data, &["login", "email"]).trim().to_string();
    let password = first_string(&data, &["password"]);
    let database = first_string(&data, &["db", "db_name", "database"])
        .trim()
        .to_string();

    if !database.is_empty()
        && let Some(expected) = state.config.database.as_deref()
        && database != expected
    {
        tracing::warn!("login: unknown database '{}'", database);
        return Err(NotFoundError::Database { name: database }.into());
    }

    tracing::info!("login attempt for '{}'", login);
    let identity = state
        .credentials
        .authenticate(&login, &password)
        .await?
        .ok_or_else(|| {
            tracing::warn!("login: credential check failed for '{}'", login);
            GatewayError::Auth(AuthError::InvalidCredentials)
        })?;

    // Reuse the live token if one exists, issue otherwise
    let token = state.tokens.ensure(identity.id).await?;
    tracing::info!(identity_id = identity.id, "login: authenticated '{}'", login);

    Ok(Json(json!({
        "identity_id": identity.id,
        "name": identity.name,
        "token": token.secret,
    })))
}

/// Logout: revoke the presented token, if any
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Result<Json<Value>, GatewayError> {
    if let Some(token) = extract_api_key(&headers, query.as_deref()) {
        state.tokens.revoke(&token).await?;
    }
    tracing::info!("logout");
    Ok(Json(json!({
        "status": "success",
        "message": "Logged out successfully",
    })))
}

/// Field metadata for a resource
///
/// Requires a valid token but deliberately no record-level authorization:
/// metadata discovery is considered safe for any authenticated caller.
pub async fn resource_fields(
    State(state): State<AppState>,
    Path(name): Path<String>,
    _identity: CurrentIdentity,
) -> Result<Json<Value>, GatewayError> {
    Ok(Json(state.registry.describe(&name)?))
}

// =============================================================================
// Dispatcher: list / read
// =============================================================================

/// List records: filter, paginate, project, optionally expand
pub async fn list_records(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    body: String,
) -> Result<Json<Value>, GatewayError> {
    let collection = state.registry.resolve(&name)?;
    let descriptor = collection.descriptor().clone();
    tracing::info!("list {}", name);

    // Read requests may carry a JSON body of defaults; the query string wins
    let body = parse_optional_body(&body)?;
    let params = merge_params(query, body);
    let plan = QueryPlan::build(&descriptor, &params, &state.config)?;

    let total = collection.count(&plan.filter, plan.active_test).await?;
    let page = collection
        .search(&plan.filter, plan.limit, plan.offset, plan.active_test)
        .await?;
    let ids: Vec<RecordId> = page.iter().filter_map(Record::id).collect();
    let mut results = collection.read(&ids, &plan.fields).await?;

    if plan.binary_urls {
        rewrite_binary_urls(&descriptor, &mut results);
    }
    if !plan.selection.nested.is_empty() {
        expand_records(
            &state.registry,
            &descriptor,
            &mut results,
            &plan.selection,
            &state.config.expansion,
        )
        .await?;
    }

    Ok(Json(json!({
        "count": results.len(),
        "total": total,
        "page": plan.page,
        "total_pages": total_pages(total, plan.limit),
        "limit": plan.limit,
        "offset": plan.offset,
        "results": results,
    })))
}

/// Read one record by id; returns the bare object, not a list
pub async fn read_record(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<Record>, GatewayError> {
    let id = parse_record_id(&id)?;
    let collection = state.registry.resolve(&name)?;
    let descriptor = collection.descriptor().clone();

    let params = merge_params(query, None);
    let plan = QueryPlan::build(&descriptor, &params, &state.config)?;

    if collection.get(id).await?.is_none() {
        return Err(not_found(&name, id));
    }
    let mut records = collection.read(&[id], &plan.fields).await?;
    let Some(record) = records.pop() else {
        return Err(not_found(&name, id));
    };
    let mut records = vec![record];

    if plan.binary_urls {
        rewrite_binary_urls(&descriptor, &mut records);
    }
    if !plan.selection.nested.is_empty() {
        expand_records(
            &state.registry,
            &descriptor,
            &mut records,
            &plan.selection,
            &state.config.expansion,
        )
        .await?;
    }

    let record = records.pop().unwrap_or_default();
    Ok(Json(record))
}

// =============================================================================
// Dispatcher: create / update / delete
// =============================================================================

/// Create a record
///
/// Identity resources additionally get a uniqueness check on login/email, a
/// password/confirm_password equality check, argon2 hashing of the password
/// and an auto-issued API token in the response.
pub async fn create_record(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: String,
) -> Result<(StatusCode, Json<Value>), GatewayError> {
    let collection = state.registry.resolve(&name)?;
    let descriptor = collection.descriptor().clone();
    tracing::info!("create {}", name);

    let mut values = parse_body_object(&body)?;
    validate_body_fields(&descriptor, &values)?;
    for (field, field_descriptor) in &descriptor.fields {
        if field_descriptor.required
            && values.get(field).filter(|v| !v.is_null()).is_none()
        {
            return Err(RequestError::MissingField {
                field: field.clone(),
            }
            .into());
        }
    }

    if descriptor.identity {
        reject_duplicate_identity(&*collection, &values).await?;
        apply_password_fields(&mut values)?;
    }

    let record = collection.create(values).await?;
    let id = record_id(&record)?;
    let display_name = record.display_name(&descriptor.display_field);

    let mut response = json!({"id": id, "display_name": display_name});
    if descriptor.identity {
        let token = state.tokens.issue(id).await?;
        response["token"] = Value::String(token.secret);
    }
    tracing::info!(id, "created {}", name);
    Ok((StatusCode::CREATED, Json(response)))
}

/// Apply a partial update to a record
pub async fn update_record(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
    body: String,
) -> Result<Json<Value>, GatewayError> {
    let id = parse_record_id(&id)?;
    let collection = state.registry.resolve(&name)?;
    let descriptor = collection.descriptor().clone();

    let mut values = parse_body_object(&body)?;
    validate_body_fields(&descriptor, &values)?;
    if descriptor.identity {
        apply_password_fields(&mut values)?;
    }

    if collection.update(id, values).await?.is_none() {
        return Err(not_found(&name, id));
    }
    tracing::info!(id, "updated {}", name);
    Ok(Json(json!({"success": true})))
}

/// Delete a record
pub async fn delete_record(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
) -> Result<StatusCode, GatewayError> {
    let id = parse_record_id(&id)?;
    let collection = state.registry.resolve(&name)?;

    if !collection.delete(id).await? {
        return Err(not_found(&name, id));
    }
    // Deleting an identity cascades to its token
    if collection.descriptor().identity {
        state.tokens.revoke_for_identity(id).await?;
    }
    tracing::info!(id, "deleted {}", name);
    Ok(StatusCode::NO_CONTENT)
}

/// PUT/DELETE on the collection path: the id is mandatory
pub async fn reject_missing_id() -> GatewayError {
    RequestError::MissingId.into()
}

// =============================================================================
// Helpers
// =============================================================================

fn not_found(resource: &str, id: RecordId) -> GatewayError {
    NotFoundError::Record {
        resource: resource.to_string(),
        id,
    }
    .into()
}

fn parse_record_id(raw: &str) -> Result<RecordId, GatewayError> {
    raw.parse().map_err(|_| {
        QueryError::InvalidParameter {
            name: "id".to_string(),
            message: "must be an integer".to_string(),
        }
        .into()
    })
}

fn record_id(record: &Record) -> Result<RecordId, GatewayError> {
    record.id().ok_or_else(|| GatewayError::Store {
        message: "store returned a record without an id".to_string(),
    })
}

/// Parse an optional JSON body used as read-parameter defaults
fn parse_optional_body(body: &str) -> Result<Option<Value>, GatewayError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(trimmed).map(Some).map_err(|_| {
        RequestError::InvalidBody {
            message: "Invalid JSON body".to_string(),
        }
        .into()
    })
}

/// Parse a required JSON object body, unwrapping the optional `params`
/// envelope some RPC-style clients send
fn parse_body_object(body: &str) -> Result<Record, GatewayError> {
    let invalid = || RequestError::InvalidBody {
        message: "Invalid JSON body".to_string(),
    };
    let parsed: Value = serde_json::from_str(body.trim()).map_err(|_| invalid())?;
    let object = match parsed {
        Value::Object(mut map) => match map.remove("params") {
            Some(Value::Object(inner)) => inner,
            Some(_) => return Err(invalid().into()),
            None => map,
        },
        _ => return Err(invalid().into()),
    };
    Ok(Record::from_values(object))
}

fn first_string(record: &Record, fields: &[&str]) -> String {
    fields
        .iter()
        .find_map(|f| record.get(f).and_then(Value::as_str))
        .unwrap_or_default()
        .to_string()
}

/// Reject body fields the descriptor does not declare
///
/// The virtual `password`/`confirm_password` inputs of identity resources
/// are allowed; they never reach the store as-is.
fn validate_body_fields(
    descriptor: &ResourceDescriptor,
    values: &Record,
) -> Result<(), GatewayError> {
    for field in values.field_names() {
        if descriptor.identity && (field == "password" || field == "confirm_password") {
            continue;
        }
        if !descriptor.has_field(field) {
            return Err(QueryError::UnknownField {
                resource: descriptor.name.clone(),
                field: field.clone(),
            }
            .into());
        }
    }
    Ok(())
}

/// Enforce login/email uniqueness before inserting an identity
async fn reject_duplicate_identity(
    collection: &dyn ResourceCollection,
    values: &Record,
) -> Result<(), GatewayError> {
    let mut terms = Vec::new();
    for field in ["login", "email"] {
        if let Some(value) = values.get(field).filter(|v| !v.is_null()) {
            terms.push(FilterNode::Condition(Condition::eq(field, value.clone())));
        }
    }
    if terms.is_empty() {
        return Ok(());
    }
    let filter = if terms.len() > 1 {
        FilterNode::Or(terms)
    } else {
        FilterNode::And(terms)
    };
    // Archived identities still hold their login: search without the
    // implicit active filter
    let existing = collection.search(&filter, 1, 0, false).await?;
    if existing.is_empty() {
        Ok(())
    } else {
        Err(GatewayError::Conflict {
            message: "A user with this login or email already exists".to_string(),
        })
    }
}

/// Turn the password/confirm_password pair into a stored hash
///
/// Present-and-unequal (including one side missing) is a 400; equal values
/// are hashed into `password_hash` and the plaintext never reaches the
/// store.
fn apply_password_fields(values: &mut Record) -> Result<(), GatewayError> {
    let password = values.remove("password");
    let confirm = values.remove("confirm_password");
    let (password, confirm) = match (password, confirm) {
        (None, None) => return Ok(()),
        pair => pair,
    };
    if let Some(confirm) = confirm
        && password.as_ref() != Some(&confirm)
    {
        return Err(RequestError::PasswordMismatch.into());
    }
    let Some(password) = password else {
        return Err(RequestError::PasswordMismatch.into());
    };
    let Some(password) = password.as_str() else {
        return Err(RequestError::InvalidBody {
            message: "password must be a string".to_string(),
        }
        .into());
    };
    values.set("password_hash", Value::String(hash_password(password)?));
    Ok(())
}

/// Replace binary payloads with retrieval URLs
fn rewrite_binary_urls(descriptor: &ResourceDescriptor, records: &mut [Record]) {
    let binary_fields: Vec<&String> = descriptor
        .fields
        .iter()
        .filter(|(_, d)| d.field_type.is_binary())
        .map(|(name, _)| name)
        .collect();
    if binary_fields.is_empty() {
        return;
    }
    for record in records.iter_mut() {
        let Some(id) = record.id() else { continue };
        for field in &binary_fields {
            if record.get(field).is_some_and(|v| !v.is_null()) {
                record.set(
                    (*field).clone(),
                    Value::String(format!(
                        "/resources/{}/{}/binary/{}",
                        descriptor.name, id, field
                    )),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resource::{FieldDescriptor, FieldType};
    use serde_json::json;

    fn record(value: Value) -> Record {
        let Value::Object(map) = value else {
            unreachable!()
        };
        Record::from_values(map)
    }

    #[test]
    fn test_parse_body_object_plain() {
        let parsed = parse_body_object(r#"{"name": "Ada"}"#).unwrap();
        assert_eq!(parsed.get("name"), Some(&json!("Ada")));
    }

    #[test]
    fn test_parse_body_object_unwraps_params_envelope() {
        let parsed = parse_body_object(r#"{"params": {"name": "Ada"}}"#).unwrap();
        assert_eq!(parsed.get("name"), Some(&json!("Ada")));
        assert!(!parsed.contains("params"));
    }

    #[test]
    fn test_parse_body_object_rejects_garbage() {
        assert!(parse_body_object("not json").is_err());
        assert!(parse_body_object("[1,2]").is_err());
        assert!(parse_body_object(r#"{"params": 42}"#).is_err());
    }

    #[test]
    fn test_parse_optional_body() {
        assert_eq!(parse_optional_body("").unwrap(), None);
        assert_eq!(parse_optional_body("   ").unwrap(), None);
        assert_eq!(
            parse_optional_body(r#"{"limit": 5}"#).unwrap(),
            Some(json!({"limit": 5}))
        );
        assert!(parse_optional_body("{broken").is_err());
    }

    #[test]
    fn test_parse_record_id() {
        assert_eq!(parse_record_id("42").unwrap(), 42);
        assert!(parse_record_id("forty-two").is_err());
    }

    #[test]
    fn test_apply_password_fields_match() {
        let mut values = record(json!({"login": "a", "password": "p", "confirm_password": "p"}));
        apply_password_fields(&mut values).unwrap();
        assert!(!values.contains("password"));
        assert!(!values.contains("confirm_password"));
        let hash = values.get("password_hash").unwrap().as_str().unwrap();
        assert!(crate::auth::credentials::verify_password("p", hash));
    }

    #[test]
    fn test_apply_password_fields_mismatch() {
        let mut values = record(json!({"password": "p", "confirm_password": "q"}));
        let err = apply_password_fields(&mut values).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_apply_password_fields_confirm_without_password() {
        let mut values = record(json!({"confirm_password": "q"}));
        assert!(apply_password_fields(&mut values).is_err());
    }

    #[test]
    fn test_apply_password_fields_absent_is_noop() {
        let mut values = record(json!({"login": "a"}));
        apply_password_fields(&mut values).unwrap();
        assert!(!values.contains("password_hash"));
    }

    #[test]
    fn test_validate_body_fields_rejects_unknown() {
        let descriptor = ResourceDescriptor::new("res.partner")
            .field("name", FieldDescriptor::new(FieldType::Char));
        let values = record(json!({"name": "A", "bogus": 1}));
        assert!(validate_body_fields(&descriptor, &values).is_err());
    }

    #[test]
    fn test_validate_body_fields_allows_password_on_identity() {
        let descriptor = ResourceDescriptor::new("res.users")
            .identity()
            .field("login", FieldDescriptor::new(FieldType::Char));
        let values = record(json!({"login": "a", "password": "p", "confirm_password": "p"}));
        validate_body_fields(&descriptor, &values).unwrap();

        let plain = ResourceDescriptor::new("res.partner")
            .field("name", FieldDescriptor::new(FieldType::Char));
        assert!(validate_body_fields(&plain, &record(json!({"password": "p"}))).is_err());
    }

    #[test]
    fn test_rewrite_binary_urls() {
        let descriptor = ResourceDescriptor::new("res.partner")
            .field("name", FieldDescriptor::new(FieldType::Char))
            .field("photo", FieldDescriptor::new(FieldType::Binary));
        let mut records = vec![
            record(json!({"id": 1, "name": "A", "photo": "aGVsbG8="})),
            record(json!({"id": 2, "name": "B", "photo": null})),
        ];
        rewrite_binary_urls(&descriptor, &mut records);
        assert_eq!(
            records[0].get("photo"),
            Some(&json!("/resources/res.partner/1/binary/photo"))
        );
        // Null payloads stay null
        assert_eq!(records[1].get("photo"), Some(&Value::Null));
    }
}
