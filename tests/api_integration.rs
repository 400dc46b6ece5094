//! API Integration Tests
//!
//! Tests the registry HTTP API routes using the router directly.

#![cfg(feature = "server")]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::util::ServiceExt;

use mesh_registry::config::Config;
use mesh_registry::{ApiConfig, ApiServer};

async fn test_router() -> axum::Router {
    let state = mesh_registry::AppState::new(Config::default()).await.unwrap();
    let server = ApiServer::with_state(state, ApiConfig::default());
    server.router()
}

fn register_payload(name: &str, namespace: &str, tags: &[&str]) -> serde_json::Value {
    serde_json::json!({
        "id": null,
        "name": name,
        "namespace": namespace,
        "version": "1.0.0",
        "endpoint": {"scheme": "http", "host": "127.0.0.1", "port": 9000},
        "capabilities": [{
            "name": "weather",
            "version": "1.0.0",
            "tags": tags,
            "description": null,
            "schema": null,
            "dependencies": []
        }]
    })
}

async fn post_json(router: &axum::Router, uri: &str, body: serde_json::Value) -> axum::http::Response<Body> {
    router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn get(router: &axum::Router, uri: &str) -> axum::http::Response<Body> {
    router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let router = test_router().await;
    let response = get(&router, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_ready_endpoint() {
    let router = test_router().await;
    let response = get(&router, "/ready").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_register_agent_then_list() {
    let router = test_router().await;

    let response = post_json(&router, "/api/v1/agents", register_payload("weather-agent", "default", &["api", "fast"])).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = get(&router, "/api/v1/agents").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["agents"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_get_missing_agent_is_404() {
    let router = test_router().await;
    let response = get(&router, &format!("/api/v1/agents/{}", uuid::Uuid::new_v4())).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_evict_then_reregister_restores_healthy() {
    let router = test_router().await;

    let response = post_json(&router, "/api/v1/agents", register_payload("weather-agent", "default", &["api"])).await;
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let agent_id = json["agent_id"].as_str().unwrap().to_string();

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/v1/agents/{agent_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = get(&router, &format!("/api/v1/agents/{agent_id}")).await;
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let agent: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(agent["status"], "evicted");

    // Reregistering under the same identity restores the same id and status.
    let response = post_json(&router, "/api/v1/agents", register_payload("weather-agent", "default", &["api"])).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["agent_id"].as_str().unwrap(), agent_id);
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_list_capabilities() {
    let router = test_router().await;
    post_json(&router, "/api/v1/agents", register_payload("weather-agent", "default", &["api"])).await;

    let response = get(&router, "/api/v1/capabilities").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["capabilities"].as_array().unwrap().len(), 1);
}
