//! REST dispatcher integration tests
//!
//! JSON → HTTP request → handler → collection → HTTP response → JSON, for
//! the generic CRUD dispatcher: envelopes, pagination, filtering,
//! projection, expansion and the error taxonomy.

mod common;

use axum::http::StatusCode;
use axum_test::TestServer;
use common::*;
use serde_json::{Value, json};

async fn authed() -> (TestServer, String) {
    let server = spawn_gateway().await;
    let token = admin_token(&server).await;
    (server, token)
}

// =============================================================================
// List envelope & pagination
// =============================================================================

#[tokio::test]
async fn test_list_envelope_shape() {
    let (server, token) = authed().await;
    let response = server
        .get("/resources/res.partner")
        .add_header("x-api-key", token)
        .add_query_param("limit", "5")
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    // 13 active partners seeded (12 plain + Tagged); Archived is hidden
    assert_eq!(body["total"], 13);
    assert_eq!(body["count"], 5);
    assert_eq!(body["limit"], 5);
    assert_eq!(body["offset"], 0);
    assert_eq!(body["page"], 1);
    assert_eq!(body["total_pages"], 3); // ceil(13 / 5)
    assert_eq!(body["results"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_list_results_never_exceed_limit() {
    let (server, token) = authed().await;
    for limit in ["1", "4", "100"] {
        let body: Value = server
            .get("/resources/res.partner")
            .add_header("x-api-key", token.clone())
            .add_query_param("limit", limit)
            .await
            .json();
        let count = body["results"].as_array().unwrap().len();
        assert!(count <= limit.parse::<usize>().unwrap());
    }
}

#[tokio::test]
async fn test_page_and_offset_agree() {
    let (server, token) = authed().await;
    let by_page: Value = server
        .get("/resources/res.partner")
        .add_header("x-api-key", token.clone())
        .add_query_param("page", "2")
        .add_query_param("limit", "10")
        .await
        .json();
    let by_offset: Value = server
        .get("/resources/res.partner")
        .add_header("x-api-key", token)
        .add_query_param("offset", "10")
        .add_query_param("limit", "10")
        .await
        .json();
    assert_eq!(by_page["results"], by_offset["results"]);
}

#[tokio::test]
async fn test_explicit_offset_wins_over_page() {
    let (server, token) = authed().await;
    let body: Value = server
        .get("/resources/res.partner")
        .add_header("x-api-key", token)
        .add_query_param("page", "3")
        .add_query_param("offset", "0")
        .add_query_param("limit", "5")
        .await
        .json();
    assert_eq!(body["offset"], 0);
    let first = &body["results"][0];
    assert_eq!(first["id"], 1);
}

#[tokio::test]
async fn test_page_size_alias() {
    let (server, token) = authed().await;
    let body: Value = server
        .get("/resources/res.partner")
        .add_header("x-api-key", token)
        .add_query_param("page_size", "3")
        .await
        .json();
    assert_eq!(body["limit"], 3);
}

#[tokio::test]
async fn test_zero_limit_is_rejected() {
    let (server, token) = authed().await;
    let response = server
        .get("/resources/res.partner")
        .add_header("x-api-key", token)
        .add_query_param("limit", "0")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_read_body_merges_under_query_string() {
    let (server, token) = authed().await;
    // Body alone supplies the limit
    let body: Value = server
        .get("/resources/res.partner")
        .add_header("x-api-key", token.clone())
        .json(&json!({"limit": 2}))
        .await
        .json();
    assert_eq!(body["limit"], 2);

    // Explicit query string wins over the body
    let body: Value = server
        .get("/resources/res.partner")
        .add_header("x-api-key", token)
        .add_query_param("limit", "1")
        .json(&json!({"limit": 2}))
        .await
        .json();
    assert_eq!(body["limit"], 1);
}

// =============================================================================
// Filtering
// =============================================================================

#[tokio::test]
async fn test_domain_filter() {
    let (server, token) = authed().await;
    let body: Value = server
        .get("/resources/res.partner")
        .add_header("x-api-key", token)
        .add_query_param("domain", r#"[["city","=","Lyon"]]"#)
        .await
        .json();
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 6); // P01, P03, ..., P11
    assert!(results.iter().all(|r| r["city"] == "Lyon"));
}

#[tokio::test]
async fn test_malformed_domain_is_400() {
    let (server, token) = authed().await;
    let response = server
        .get("/resources/res.partner")
        .add_header("x-api-key", token)
        .add_query_param("domain", "not-json")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_archived_records_hidden_by_default() {
    let (server, token) = authed().await;
    let body: Value = server
        .get("/resources/res.partner")
        .add_header("x-api-key", token)
        .await
        .json();
    let names: Vec<&str> = body["results"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|r| r["name"].as_str())
        .collect();
    assert!(!names.contains(&"Archived"));
}

#[tokio::test]
async fn test_is_active_false_returns_archived() {
    let (server, token) = authed().await;
    let body: Value = server
        .get("/resources/res.partner")
        .add_header("x-api-key", token)
        .add_query_param("is_active", "false")
        .await
        .json();
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["name"], "Archived");
}

#[tokio::test]
async fn test_is_active_overrides_domain_term() {
    let (server, token) = authed().await;
    // The domain says active=true but the flag wins on that field
    let body: Value = server
        .get("/resources/res.partner")
        .add_header("x-api-key", token)
        .add_query_param("domain", r#"[["active","=",true]]"#)
        .add_query_param("is_active", "false")
        .await
        .json();
    assert_eq!(body["results"].as_array().unwrap().len(), 1);
}

// =============================================================================
// Projection
// =============================================================================

#[tokio::test]
async fn test_fields_projection() {
    let (server, token) = authed().await;
    let body: Value = server
        .get("/resources/res.partner")
        .add_header("x-api-key", token)
        .add_query_param("fields", r#"["name"]"#)
        .add_query_param("limit", "1")
        .await
        .json();
    let record = body["results"][0].as_object().unwrap();
    let mut keys: Vec<&String> = record.keys().collect();
    keys.sort();
    assert_eq!(keys, ["id", "name"]);
}

#[tokio::test]
async fn test_fields_comma_list() {
    let (server, token) = authed().await;
    let body: Value = server
        .get("/resources/res.partner")
        .add_header("x-api-key", token)
        .add_query_param("fields", "name,city")
        .add_query_param("limit", "1")
        .await
        .json();
    let record = body["results"][0].as_object().unwrap();
    assert!(record.contains_key("name"));
    assert!(record.contains_key("city"));
    assert!(!record.contains_key("company"));
}

#[tokio::test]
async fn test_unknown_field_is_400() {
    let (server, token) = authed().await;
    let response = server
        .get("/resources/res.partner")
        .add_header("x-api-key", token)
        .add_query_param("fields", r#"["bogus"]"#)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_binary_url_rewrite() {
    let (server, token) = authed().await;
    let body: Value = server
        .get("/resources/res.partner")
        .add_header("x-api-key", token.clone())
        .add_query_param("domain", r#"[["name","=","Tagged"]]"#)
        .add_query_param("image_url", "true")
        .await
        .json();
    let record = &body["results"][0];
    let id = record["id"].as_i64().unwrap();
    assert_eq!(
        record["logo"],
        json!(format!("/resources/res.partner/{}/binary/logo", id))
    );

    // Without the flag the base64 payload is returned inline
    let body: Value = server
        .get("/resources/res.partner")
        .add_header("x-api-key", token)
        .add_query_param("domain", r#"[["name","=","Tagged"]]"#)
        .await
        .json();
    assert_eq!(body["results"][0]["logo"], "aGVsbG8=");
}

// =============================================================================
// Relation expansion
// =============================================================================

#[tokio::test]
async fn test_many_to_one_expansion_matches_independent_read() {
    let (server, token) = authed().await;
    let body: Value = server
        .get("/resources/res.partner")
        .add_header("x-api-key", token.clone())
        .add_query_param("fields", r#"["name","company.name"]"#)
        .add_query_param("limit", "1")
        .await
        .json();
    let company = &body["results"][0]["company"];
    assert_eq!(company["name"], "Acme");

    // Round-trip: expansion equals the independent single read restricted
    // to the same sub-fields
    let independent: Value = server
        .get("/resources/res.company/1")
        .add_header("x-api-key", token)
        .add_query_param("fields", r#"["name"]"#)
        .await
        .json();
    assert_eq!(company, &independent);
}

#[tokio::test]
async fn test_to_many_expansion() {
    let (server, token) = authed().await;
    let body: Value = server
        .get("/resources/res.partner")
        .add_header("x-api-key", token)
        .add_query_param("domain", r#"[["name","=","Tagged"]]"#)
        .add_query_param("fields", r#"["name","tags.label"]"#)
        .await
        .json();
    let tags = body["results"][0]["tags"].as_array().unwrap().clone();
    assert_eq!(tags.len(), 2);
    assert_eq!(tags[0]["label"], "vip");
    assert_eq!(tags[1]["label"], "new");
}

#[tokio::test]
async fn test_expansion_depth_limit() {
    let server = spawn_gateway().await;
    let token = admin_token(&server).await;
    let response = server
        .get("/resources/res.users")
        .add_header("x-api-key", token)
        .add_query_param(
            "fields",
            r#"["manager.manager.manager.manager.manager.name"]"#,
        )
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_nested_two_level_expansion() {
    let (server, token) = authed().await;
    let body: Value = server
        .get("/resources/res.users")
        .add_header("x-api-key", token)
        .add_query_param("domain", r#"[["login","=","ada"]]"#)
        .add_query_param("fields", r#"["name","manager.name","manager.manager.name"]"#)
        .await
        .json();
    let manager = &body["results"][0]["manager"];
    assert_eq!(manager["name"], "Admin");
    // Admin has no manager: the nested reference stays null
    assert_eq!(manager["manager"], Value::Null);
}

// =============================================================================
// Single-record reads
// =============================================================================

#[tokio::test]
async fn test_read_one_returns_bare_object() {
    let (server, token) = authed().await;
    let response = server
        .get("/resources/res.partner/1")
        .add_header("x-api-key", token)
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["id"], 1);
    assert_eq!(body["name"], "P01");
    assert!(body.get("results").is_none());
}

#[tokio::test]
async fn test_read_one_unknown_id_is_404() {
    let (server, token) = authed().await;
    let response = server
        .get("/resources/res.partner/999")
        .add_header("x-api-key", token)
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_read_one_non_integer_id_is_400() {
    let (server, token) = authed().await;
    let response = server
        .get("/resources/res.partner/abc")
        .add_header("x-api-key", token)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_repeated_reads_are_identical() {
    let (server, token) = authed().await;
    let first: Value = server
        .get("/resources/res.partner/3")
        .add_header("x-api-key", token.clone())
        .await
        .json();
    let second: Value = server
        .get("/resources/res.partner/3")
        .add_header("x-api-key", token)
        .await
        .json();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_unknown_resource_is_404_when_authed() {
    let (server, token) = authed().await;
    let response = server
        .get("/resources/res.nonexistent")
        .add_header("x-api-key", token)
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    let body: Value = response.json();
    assert_eq!(body["error"], "RESOURCE_NOT_FOUND");
}

// =============================================================================
// Field metadata
// =============================================================================

#[tokio::test]
async fn test_fields_metadata_endpoint() {
    let (server, token) = authed().await;
    let response = server
        .get("/resources/res.partner/fields")
        .add_header("x-api-key", token)
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["name"]["type"], "char");
    assert_eq!(body["company"]["type"], "many_to_one");
    assert_eq!(body["company"]["relation"], "res.company");
    assert_eq!(body["tags"]["type"], "to_many");
    assert_eq!(body["logo"]["type"], "binary");
}

#[tokio::test]
async fn test_fields_metadata_requires_auth() {
    let server = spawn_gateway().await;
    let response = server.get("/resources/res.partner/fields").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Create / update / delete
// =============================================================================

#[tokio::test]
async fn test_crud_roundtrip() {
    let (server, token) = authed().await;

    // Create
    let response = server
        .post("/resources/res.partner")
        .add_header("x-api-key", token.clone())
        .json(&json!({"name": "Fresh", "city": "Nantes"}))
        .await;
    response.assert_status(StatusCode::CREATED);
    let created: Value = response.json();
    let id = created["id"].as_i64().unwrap();
    assert_eq!(created["display_name"], "Fresh");

    // Read back
    let body: Value = server
        .get(&format!("/resources/res.partner/{}", id))
        .add_header("x-api-key", token.clone())
        .await
        .json();
    assert_eq!(body["city"], "Nantes");

    // Update
    let response = server
        .put(&format!("/resources/res.partner/{}", id))
        .add_header("x-api-key", token.clone())
        .json(&json!({"city": "Brest"}))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);

    let body: Value = server
        .get(&format!("/resources/res.partner/{}", id))
        .add_header("x-api-key", token.clone())
        .await
        .json();
    assert_eq!(body["city"], "Brest");
    assert_eq!(body["name"], "Fresh"); // untouched field survives

    // Delete
    let response = server
        .delete(&format!("/resources/res.partner/{}", id))
        .add_header("x-api-key", token.clone())
        .await;
    response.assert_status(StatusCode::NO_CONTENT);

    let response = server
        .get(&format!("/resources/res.partner/{}", id))
        .add_header("x-api-key", token)
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_accepts_params_envelope() {
    let (server, token) = authed().await;
    let response = server
        .post("/resources/res.partner")
        .add_header("x-api-key", token)
        .json(&json!({"params": {"name": "Wrapped"}}))
        .await;
    response.assert_status(StatusCode::CREATED);
}

#[tokio::test]
async fn test_create_unknown_field_is_400() {
    let (server, token) = authed().await;
    let response = server
        .post("/resources/res.partner")
        .add_header("x-api-key", token)
        .json(&json!({"name": "X", "bogus": 1}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_missing_required_field_is_400() {
    let (server, token) = authed().await;
    let response = server
        .post("/resources/res.partner")
        .add_header("x-api-key", token)
        .json(&json!({"city": "Nantes"}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_invalid_json_is_400() {
    let (server, token) = authed().await;
    let response = server
        .post("/resources/res.partner")
        .add_header("x-api-key", token)
        .text("{broken")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_without_id_is_400() {
    let (server, token) = authed().await;
    let response = server
        .put("/resources/res.partner")
        .add_header("x-api-key", token)
        .json(&json!({"city": "Brest"}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let body: Value = response.json();
    assert_eq!(body["error"], "ID_REQUIRED");
}

#[tokio::test]
async fn test_delete_without_id_is_400() {
    let (server, token) = authed().await;
    let response = server
        .delete("/resources/res.partner")
        .add_header("x-api-key", token)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_unknown_id_is_404() {
    let (server, token) = authed().await;
    let response = server
        .put("/resources/res.partner/999")
        .add_header("x-api-key", token)
        .json(&json!({"city": "Brest"}))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_unknown_id_is_404() {
    let (server, token) = authed().await;
    let response = server
        .delete("/resources/res.partner/999")
        .add_header("x-api-key", token)
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}
