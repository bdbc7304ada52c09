#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use migration::MigratorTrait;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use serde::Serialize;
use taskboard_server::config::Config;
use testcontainers_modules::testcontainers::runners::AsyncRunner;
use testcontainers_modules::{postgres, testcontainers};
use tower::ServiceExt;

pub const JWT_SECRET: &str = "integration-test-secret";

/// Opens a fresh in-memory SQLite database with the schema applied.
///
/// A single pooled connection keeps every query on the same in-memory database.
pub async fn setup_db() -> anyhow::Result<DatabaseConnection> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

pub async fn setup_container() -> anyhow::Result<testcontainers::ContainerAsync<postgres::Postgres>>
{
    let container = postgres::Postgres::default().start().await?;
    Ok(container)
}

pub async fn setup_postgres_db(
    container: &testcontainers::ContainerAsync<postgres::Postgres>,
) -> anyhow::Result<DatabaseConnection> {
    let host = container.get_host().await?;
    let port = container.get_host_port_ipv4(5432).await?;
    let db_url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);
    let db = Database::connect(&db_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

pub fn test_config() -> Config {
    Config {
        db_url: "sqlite::memory:".to_string(),
        port: 0,
        jwt_secret: JWT_SECRET.to_string(),
        token_ttl_hours: 1,
    }
}

/// Builds the full application on top of a fresh database.
pub async fn create_test_app() -> (Router, DatabaseConnection) {
    let db = setup_db().await.expect("Failed to setup test database");
    let app = taskboard_server::web::create_app(&test_config(), db.clone());
    (app, db)
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("response body is not JSON")
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    TestResponse {
        status,
        headers,
        body: String::from_utf8(body.to_vec()).unwrap(),
    }
}

pub fn json_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("x-auth-token", token);
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Registers a user through the API and returns the issued token.
pub async fn register(app: &Router, identity: &str, display_name: &str, secret: &str) -> String {
    let response = send(
        app,
        json_request(
            "POST",
            "/api/auth/register",
            None,
            Some(serde_json::json!({
                "identity": identity,
                "displayName": display_name,
                "secret": secret,
            })),
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);
    response.json()["token"].as_str().unwrap().to_string()
}

/// Status and JSON body of an API response, for snapshot testing.
#[derive(Serialize)]
pub struct ApiResponseSnapshot {
    pub status: u16,
    pub body: serde_json::Value,
}

impl ApiResponseSnapshot {
    pub fn new(response: &TestResponse) -> Self {
        Self {
            status: response.status.as_u16(),
            body: response.json(),
        }
    }
}
