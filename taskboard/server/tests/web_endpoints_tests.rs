use axum::body::Body;
use axum::http::{Request, StatusCode, header};

mod common;

use common::{create_test_app, register, send};

fn page_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::COOKIE, format!("token={}", token));
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn can_check_health() {
    let (app, _db) = create_test_app().await;

    let response = send(&app, page_request("/health", None)).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, "OK");
}

#[tokio::test]
async fn can_show_entry_page_to_visitors() {
    let (app, _db) = create_test_app().await;

    let response = send(&app, page_request("/", None)).await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("id=\"auth-form\""));
}

#[tokio::test]
async fn can_redirect_signed_in_visitor_to_dashboard() {
    let (app, _db) = create_test_app().await;
    let token = register(&app, "alice", "Alice", "secret1").await;

    let response = send(&app, page_request("/", Some(&token))).await;

    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.headers[header::LOCATION], "/dashboard");
}

#[tokio::test]
async fn can_redirect_anonymous_dashboard_visit_to_entry_page() {
    let (app, _db) = create_test_app().await;

    for token in [None, Some("garbage")] {
        let response = send(&app, page_request("/dashboard", token)).await;
        assert_eq!(response.status, StatusCode::SEE_OTHER);
        assert_eq!(response.headers[header::LOCATION], "/");
    }
}

#[tokio::test]
async fn can_show_dashboard_with_valid_cookie() {
    let (app, _db) = create_test_app().await;
    let token = register(&app, "alice", "Alice", "secret1").await;

    let response = send(&app, page_request("/dashboard", Some(&token))).await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("Hello,"));
    assert!(response.body.contains("id=\"task-form\""));
}

#[tokio::test]
async fn can_serve_openapi_document() {
    let (app, _db) = create_test_app().await;

    let response = send(&app, page_request("/api-docs/openapi.json", None)).await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.json()["paths"]["/api/tasks/{id}"].is_object());
}
