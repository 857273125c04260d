//! End-to-end checks against a real Postgres.
//!
//! Run with `DATABASE_URL=postgres://... cargo test -- --ignored`.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tower::ServiceExt;
use uuid::Uuid;

use sunshare::{
    app::build_app,
    auth::jwt::JwtKeys,
    config::{AppConfig, Environment, JwtConfig, SeedConfig},
    invoices, locations, migrate,
    pagination::PageQuery,
    payments, projects, roles,
    seed::{self, SeedOptions},
    state::AppState,
    users,
};

const ADMIN_EMAIL: &str = "itest.admin@sunshare.local";
const ADMIN_PASSWORD: &str = "itest-password";

fn config(database_url: String) -> AppConfig {
    AppConfig {
        environment: Environment::Development,
        database_url,
        max_connections: 5,
        host: "127.0.0.1".into(),
        port: 0,
        backend_url: "http://localhost".into(),
        migrations_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("migrations"),
        jwt: JwtConfig {
            secret: "integration-secret".into(),
            issuer: "sunshare".into(),
            audience: "sunshare-admin".into(),
            ttl_minutes: 5,
            refresh_ttl_minutes: 60,
        },
        seed: SeedConfig {
            admin_email: ADMIN_EMAIL.into(),
            admin_password: ADMIN_PASSWORD.into(),
        },
    }
}

/// Migrated and seeded database.
async fn setup() -> AppState {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL for ignored tests");
    let config = config(url);
    let db: PgPool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .expect("connect");

    migrate::postgres(db.clone(), &config.migrations_dir)
        .up(None)
        .await
        .expect("migrations");
    seed::run(&db, &config.seed, SeedOptions { demo: true, force_password: false })
        .await
        .expect("seed");

    AppState::from_parts(db, Arc::new(config))
}

async fn token_for(state: &AppState, email: &str) -> String {
    let user = users::repo::find_by_email(&state.db, email)
        .await
        .unwrap()
        .expect("seeded user");
    JwtKeys::from(&state.config.jwt)
        .sign_access(user.id, &user.role_name)
        .unwrap()
}

async fn admin_token(state: &AppState) -> String {
    token_for(state, ADMIN_EMAIL).await
}

async fn location_counts(db: &PgPool) -> Vec<i64> {
    let mut counts = Vec::new();
    for table in ["countries", "states", "cities"] {
        let sql = format!("SELECT COUNT(*) FROM {table}");
        counts.push(sqlx::query_scalar::<_, i64>(&sql).fetch_one(db).await.unwrap());
    }
    counts
}

async fn call(app: &Router, method: &str, uri: &str, token: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"));
    let req = match body {
        Some(b) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(b.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
#[ignore]
async fn migrations_are_idempotent() {
    let state = setup().await;
    let migrator = migrate::postgres(state.db.clone(), &state.config.migrations_dir);

    assert!(migrator.up(None).await.unwrap().is_empty());

    let dupes: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM (SELECT filename FROM migrations GROUP BY filename HAVING COUNT(*) > 1) d",
    )
    .fetch_one(&state.db)
    .await
    .unwrap();
    assert_eq!(dupes, 0);
    assert!(migrator.status().await.unwrap().pending.is_empty());
}

#[tokio::test]
#[ignore]
async fn seeding_twice_keeps_admin_password() {
    let state = setup().await;
    let before = users::repo::find_by_email(&state.db, ADMIN_EMAIL).await.unwrap().unwrap();

    let report = seed::run(&state.db, &state.config.seed, SeedOptions::default())
        .await
        .unwrap();
    assert_eq!(report.roles.inserted, 0);
    assert_eq!(report.users.inserted, 0);

    let after = users::repo::find_by_email(&state.db, ADMIN_EMAIL).await.unwrap().unwrap();
    assert_eq!(before.id, after.id);
    assert_eq!(before.password_hash, after.password_hash);

    let admins: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = $1")
        .bind(ADMIN_EMAIL)
        .fetch_one(&state.db)
        .await
        .unwrap();
    assert_eq!(admins, 1);

    let report = seed::run(
        &state.db,
        &state.config.seed,
        SeedOptions { demo: false, force_password: true },
    )
    .await
    .unwrap();
    assert_eq!(report.passwords_reset, 1);
    let forced = users::repo::find_by_email(&state.db, ADMIN_EMAIL).await.unwrap().unwrap();
    assert_ne!(forced.password_hash, after.password_hash);
}

#[tokio::test]
#[ignore]
async fn role_upsert_leaves_existing_row() {
    let state = setup().await;
    let before = roles::repo::find_by_name(&state.db, "investor").await.unwrap().unwrap();

    let (role, inserted) = roles::repo::upsert_by_name(&state.db, "investor", Some("changed"))
        .await
        .unwrap();
    assert!(!inserted);
    assert_eq!(role.id, before.id);
    assert_eq!(role.description, before.description);
}

#[tokio::test]
#[ignore]
async fn project_lifecycle_over_http() {
    let state = setup().await;
    let token = admin_token(&state).await;
    let offtaker = users::repo::find_by_email(&state.db, "offtaker.demo@sunshare.local")
        .await
        .unwrap()
        .expect("demo offtaker");
    let app = build_app(state.clone());

    let (status, body) = call(
        &app,
        "POST",
        "/api/projects",
        &token,
        Some(json!({ "name": "Rooftop", "project_type": "rooftop" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let name = format!("Rooftop {}", Uuid::new_v4());
    let (status, body) = call(
        &app,
        "POST",
        "/api/projects",
        &token,
        Some(json!({
            "name": name,
            "project_type": "rooftop",
            "offtaker_id": offtaker.id,
            "investor_profit_share": 60,
            "sunshare_profit_share": 25,
            "offtaker_profit_share": 15,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = call(&app, "GET", &format!("/api/projects/{id}"), &token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], name);

    let (status, _) = call(
        &app,
        "PATCH",
        &format!("/api/projects/{id}/status"),
        &token,
        Some(json!({ "status": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = call(&app, "GET", &format!("/api/projects/{id}"), &token, None).await;
    assert_eq!(body["data"]["status"], 0);

    let (status, _) = call(&app, "DELETE", &format!("/api/projects/{id}"), &token, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&app, "GET", &format!("/api/projects/{id}"), &token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_deleted"], true);

    let filter = projects::repo::ProjectFilter {
        search: Some(name.clone()),
        ..Default::default()
    };
    let (items, total) = projects::repo::list(&state.db, &filter, &PageQuery::default())
        .await
        .unwrap();
    assert_eq!(total, 0);
    assert!(items.is_empty());
}

#[tokio::test]
#[ignore]
async fn page_past_the_end_is_empty() {
    let state = setup().await;
    let token = admin_token(&state).await;
    let app = build_app(state);

    let (status, body) = call(&app, "GET", "/api/roles?page=999&limit=10", &token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["items"], json!([]));
    assert_eq!(body["data"]["page"], 999);
    let total = body["data"]["total"].as_i64().unwrap();
    assert_eq!(body["data"]["pages"], (total + 9) / 10);
}

#[tokio::test]
#[ignore]
async fn malformed_body_gets_failure_envelope() {
    let state = setup().await;
    let token = admin_token(&state).await;
    let app = build_app(state);

    let (status, body) = call(
        &app,
        "POST",
        "/api/projects",
        &token,
        Some(json!({ "name": "A", "project_type": "rooftop", "offtaker_id": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("offtaker_id"));

    let (status, body) = call(&app, "GET", "/api/projects?page=abc", &token, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
#[ignore]
async fn raising_invoice_amount_reopens_paid_invoice() {
    let state = setup().await;
    let offtaker = users::repo::find_by_email(&state.db, "offtaker.demo@sunshare.local")
        .await
        .unwrap()
        .expect("demo offtaker");
    let project = projects::repo::create(
        &state.db,
        &projects::repo::NewProject {
            name: format!("Invoice site {}", Uuid::new_v4()),
            project_type: "rooftop".into(),
            offtaker_id: offtaker.id,
            address: None,
            city_id: None,
            state_id: None,
            country_id: None,
            capacity_kw: None,
            investor_profit_share: None,
            sunshare_profit_share: None,
            offtaker_profit_share: None,
            status: 1,
        },
    )
    .await
    .unwrap();
    let invoice = invoices::repo::create(
        &state.db,
        &invoices::repo::NewInvoice {
            project_id: project.id,
            offtaker_id: offtaker.id,
            invoice_number: format!("INV-{}", Uuid::new_v4()),
            period_start: None,
            period_end: None,
            units_kwh: None,
            amount: Decimal::new(100, 0),
            due_date: None,
            status: invoices::repo::UNPAID,
        },
    )
    .await
    .unwrap();

    let (_, status) = payments::repo::create(
        &state.db,
        &payments::repo::NewPayment {
            invoice_id: invoice.id,
            user_id: None,
            amount: Decimal::new(100, 0),
            method: None,
            reference: None,
            paid_at: None,
        },
    )
    .await
    .unwrap()
    .expect("invoice exists");
    assert_eq!(status, invoices::repo::PAID);

    let raised = invoices::repo::update(
        &state.db,
        invoice.id,
        &invoices::repo::InvoiceChanges {
            amount: Some(Decimal::new(300, 0)),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(raised.amount, Decimal::new(300, 0));
    assert_eq!(raised.paid_amount, Decimal::new(100, 0));
    assert_eq!(raised.status, invoices::repo::PARTIALLY_PAID);

    invoices::repo::set_status(&state.db, invoice.id, invoices::repo::CANCELLED)
        .await
        .unwrap();
    let cancelled = invoices::repo::update(
        &state.db,
        invoice.id,
        &invoices::repo::InvoiceChanges {
            amount: Some(Decimal::new(50, 0)),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(cancelled.status, invoices::repo::CANCELLED);
}

#[tokio::test]
#[ignore]
async fn blank_first_name_leaves_user_name() {
    let state = setup().await;
    let token = admin_token(&state).await;
    let investor = users::repo::find_by_email(&state.db, "investor.demo@sunshare.local")
        .await
        .unwrap()
        .expect("demo investor");
    let app = build_app(state);

    let (status, body) = call(
        &app,
        "PUT",
        &format!("/api/users/{}", investor.id),
        &token,
        Some(json!({ "first_name": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["first_name"], investor.first_name);
}

#[tokio::test]
#[ignore]
async fn reseeding_keeps_location_tree() {
    let state = setup().await;
    let before = location_counts(&state.db).await;

    let report = seed::run(&state.db, &state.config.seed, SeedOptions::default())
        .await
        .unwrap();
    assert_eq!(report.countries.inserted, 0);
    assert_eq!(report.states.inserted, 0);
    assert_eq!(report.cities.inserted, 0);
    assert_eq!(location_counts(&state.db).await, before);

    let india = locations::repo::upsert_country(&state.db, "India", "IN").await.unwrap();
    assert!(!india.1);
    let (maharashtra, inserted) = locations::repo::upsert_state(&state.db, india.0, "Maharashtra")
        .await
        .unwrap();
    assert!(!inserted);
    let (_, inserted) = locations::repo::upsert_city(&state.db, maharashtra, "Pune").await.unwrap();
    assert!(!inserted);

    let (states, total) = locations::repo::list_states(&state.db, Some(india.0), &PageQuery::default())
        .await
        .unwrap();
    assert!(total >= 4);
    assert!(states.iter().all(|s| s.country_id == india.0));
}

#[tokio::test]
#[ignore]
async fn locations_readable_by_any_user_but_managed_by_admins() {
    let state = setup().await;
    let admin = admin_token(&state).await;
    let investor = token_for(&state, "investor.demo@sunshare.local").await;
    let app = build_app(state.clone());

    let (status, body) = call(&app, "GET", "/api/countries?search=ind", &investor, None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["data"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|c| c["name"].as_str())
        .collect();
    assert!(names.contains(&"India"));

    let (status, _) = call(&app, "GET", "/api/cities", &investor, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(
        &app,
        "POST",
        "/api/countries",
        &investor,
        Some(json!({ "name": "Nowhere", "code": "NW" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);

    let india = locations::repo::upsert_country(&state.db, "India", "IN").await.unwrap().0;
    let (status, body) = call(
        &app,
        "POST",
        "/api/states",
        &admin,
        Some(json!({ "country_id": india, "name": "Maharashtra" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
}
