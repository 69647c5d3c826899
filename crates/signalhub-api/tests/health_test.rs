//! Integration tests for the health endpoints.

mod helpers;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use signalhub_api::build_app;

async fn get(path: &str) -> (StatusCode, Value) {
    let state = helpers::test_state();
    let app = build_app(state.clone(), &state.config.server.cors);
    let response = app
        .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_health_check() {
    let (status, body) = get("/api/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
    assert!(body["data"]["version"].is_string());
}

#[tokio::test]
async fn test_detailed_health_check() {
    let (status, body) = get("/api/health/detailed").await;

    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["status"], "ok");
    assert_eq!(data["store_mode"], "volatile");
    assert_eq!(data["store"], "reachable");
    assert_eq!(data["ws_connections"], 0);
    assert_eq!(data["metrics"]["joins"], 0);
}

#[tokio::test]
async fn test_ws_upgrade_without_upgrade_headers() {
    let (status, _) = get("/ws").await;

    assert!(status.is_client_error(), "got {status}");
}

#[tokio::test]
async fn test_unknown_route() {
    let (status, _) = get("/api/files").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
