//! Shared test fixture: a fully wired gateway over in-memory collections
//!
//! The fixture registers four resources — an identity resource plus a small
//! partner/company/tag graph with relations and a binary field — and seeds
//! enough records to exercise pagination, filtering and expansion.

use axum_test::TestServer;
use restgate::prelude::*;
use serde_json::{Value, json};

pub fn record(value: Value) -> Record {
    let Value::Object(map) = value else {
        panic!("record fixture must be a JSON object");
    };
    Record::from_values(map)
}

pub fn users_descriptor() -> ResourceDescriptor {
    ResourceDescriptor::new("res.users")
        .identity()
        .with_active_field("active")
        .field("name", FieldDescriptor::new(FieldType::Char).required())
        .field("login", FieldDescriptor::new(FieldType::Char).required())
        .field("email", FieldDescriptor::new(FieldType::Char))
        .field(
            "password_hash",
            FieldDescriptor::new(FieldType::Char).internal(),
        )
        .field("active", FieldDescriptor::new(FieldType::Boolean))
        .field(
            "manager",
            FieldDescriptor::new(FieldType::ManyToOne {
                relation: "res.users".to_string(),
            }),
        )
}

pub fn partners_descriptor() -> ResourceDescriptor {
    ResourceDescriptor::new("res.partner")
        .with_active_field("active")
        .field("name", FieldDescriptor::new(FieldType::Char).required())
        .field("city", FieldDescriptor::new(FieldType::Char))
        .field("active", FieldDescriptor::new(FieldType::Boolean))
        .field(
            "company",
            FieldDescriptor::new(FieldType::ManyToOne {
                relation: "res.company".to_string(),
            }),
        )
        .field(
            "tags",
            FieldDescriptor::new(FieldType::ToMany {
                relation: "res.tag".to_string(),
            }),
        )
        .field("logo", FieldDescriptor::new(FieldType::Binary))
}

pub fn companies_descriptor() -> ResourceDescriptor {
    ResourceDescriptor::new("res.company")
        .field("name", FieldDescriptor::new(FieldType::Char).required())
        .field("country", FieldDescriptor::new(FieldType::Char))
}

pub fn tags_descriptor() -> ResourceDescriptor {
    ResourceDescriptor::new("res.tag")
        .with_display_field("label")
        .field("label", FieldDescriptor::new(FieldType::Char).required())
}

/// Build and seed the test gateway
pub async fn spawn_gateway() -> TestServer {
    let users = InMemoryCollection::new(users_descriptor());
    users
        .create(record(json!({
            "name": "Admin",
            "login": "admin",
            "email": "admin@x.com",
            "password_hash": restgate::auth::credentials::hash_password("admin-pass").unwrap(),
        })))
        .await
        .unwrap();
    users
        .create(record(json!({
            "name": "Ada",
            "login": "ada",
            "email": "ada@x.com",
            "password_hash": restgate::auth::credentials::hash_password("ada-pass").unwrap(),
            "manager": 1,
        })))
        .await
        .unwrap();

    let companies = InMemoryCollection::new(companies_descriptor());
    companies
        .create(record(json!({"name": "Acme", "country": "FR"})))
        .await
        .unwrap();

    let tags = InMemoryCollection::new(tags_descriptor());
    tags.create(record(json!({"label": "vip"}))).await.unwrap();
    tags.create(record(json!({"label": "new"}))).await.unwrap();

    let partners = InMemoryCollection::new(partners_descriptor());
    for i in 1..=12 {
        let city = if i % 2 == 0 { "Paris" } else { "Lyon" };
        partners
            .create(record(json!({
                "name": format!("P{:02}", i),
                "city": city,
                "company": 1,
            })))
            .await
            .unwrap();
    }
    // One partner with tags and a logo, one archived partner
    partners
        .create(record(json!({
            "name": "Tagged",
            "city": "Paris",
            "company": 1,
            "tags": [1, 2],
            "logo": "aGVsbG8=",
        })))
        .await
        .unwrap();
    partners
        .create(record(json!({
            "name": "Archived",
            "city": "Paris",
            "active": false,
        })))
        .await
        .unwrap();

    let mut config = GatewayConfig::default();
    config.database = Some("testdb".to_string());

    let router = GatewayBuilder::new()
        .with_config(config)
        .register(users)
        .register(partners)
        .register(companies)
        .register(tags)
        .build();

    TestServer::new(router)
}

/// Log in as the seeded admin and return the API token
pub async fn admin_token(server: &TestServer) -> String {
    let response = server
        .post("/sessions")
        .json(&json!({"login": "admin", "password": "admin-pass"}))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    body["token"]
        .as_str()
        .expect("login response should carry a token")
        .to_string()
}
