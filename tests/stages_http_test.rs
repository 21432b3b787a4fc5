//! HTTP API tests driven through the router without binding a socket.

mod common;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use common::Harness;
use stagegate::adapters::http::StagesHttpServer;
use stagegate::domain::errors::{DomainError, DomainResult};
use stagegate::domain::models::{Persona, ServerConfig};
use stagegate::domain::ports::PersonaDirectory;

struct StaticDirectory(Vec<Persona>);

#[async_trait]
impl PersonaDirectory for StaticDirectory {
    async fn list_personas(&self) -> DomainResult<Vec<Persona>> {
        Ok(self.0.clone())
    }
}

struct UnreachableDirectory;

#[async_trait]
impl PersonaDirectory for UnreachableDirectory {
    async fn list_personas(&self) -> DomainResult<Vec<Persona>> {
        Err(DomainError::Upstream("prompt store returned 503 Service Unavailable: down".to_string()))
    }
}

fn persona(slug: &str, capabilities: &[&str]) -> Persona {
    Persona {
        id: format!("id-{slug}"),
        slug: slug.to_string(),
        name: slug.to_uppercase(),
        kind: "persona".to_string(),
        capabilities: capabilities.iter().map(|c| (*c).to_string()).collect(),
    }
}

async fn router() -> Router {
    let h = Harness::without_velocity().await;
    StagesHttpServer::new(h.service, ServerConfig::default()).build_router()
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    send_with_headers(app, method, uri, body, &[]).await
}

async fn send_with_headers(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    headers: &[(&str, &str)],
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let body = match body {
        Some(v) => {
            builder = builder.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

async fn create_item(app: &Router, tier: &str) -> String {
    let (status, body) = send(app, "POST", "/api/v1/backlog", Some(json!({"title": "Checkout flow", "model_tier": tier}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["current_stage"].is_null());
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health() {
    let app = router().await;
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("OK".to_string()));
}

#[tokio::test]
async fn test_economy_lifecycle_over_http() {
    let app = router().await;
    let id = create_item(&app, "economy").await;

    let (status, body) = send(&app, "POST", &format!("/api/v1/backlog/{id}/init-stages"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["item"]["current_stage"], "implement");
    assert_eq!(body["item"]["stage_template"], json!(["implement", "verify"]));
    assert_eq!(body["gates"][0]["criteria"][0]["criterion"], "code complete");

    let (status, body) = send(&app, "POST", &format!("/api/v1/backlog/{id}/advance-stage"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "GATE_UNMET");
    assert_eq!(body["current_stage"], "implement");
    assert_eq!(body["unmet"], json!(["code complete"]));

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/backlog/{id}/gate/satisfy"),
        Some(json!({"criterion": "code complete", "satisfied_by": "agent-3"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["all_met"], true);
    assert_eq!(body["criteria"][0]["satisfied_by"], "agent-3");

    let (status, body) = send_with_headers(
        &app,
        "POST",
        &format!("/api/v1/backlog/{id}/advance-stage"),
        None,
        &[("x-agent-id", "agent-3")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["previous_stage"], "implement");
    assert_eq!(body["current_stage"], "verify");
    assert_eq!(body["completed"], true);

    let (status, body) = send(&app, "POST", &format!("/api/v1/backlog/{id}/advance-stage"), Some(json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "FINAL_STAGE");
}

#[tokio::test]
async fn test_reinit_conflicts_unless_replaced() {
    let app = router().await;
    let id = create_item(&app, "standard").await;
    let uri = format!("/api/v1/backlog/{id}/init-stages");

    assert_eq!(send(&app, "POST", &uri, None).await.0, StatusCode::OK);

    let (status, body) = send(&app, "POST", &uri, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "STAGES_ALREADY_INITIALIZED");

    let (status, body) = send(&app, "POST", &uri, Some(json!({"template": ["draft", "publish"], "replace": true}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["item"]["current_stage"], "draft");
}

#[tokio::test]
async fn test_duplicate_stage_names_are_bad_request() {
    let app = router().await;
    let id = create_item(&app, "standard").await;
    let uri = format!("/api/v1/backlog/{id}/init-stages");

    let (status, body) = send(&app, "POST", &uri, Some(json!({"template": ["verify", "verify"]}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_REQUEST");

    let (status, body) = send(&app, "GET", &format!("/api/v1/backlog/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["current_stage"].is_null());
}

#[tokio::test]
async fn test_forced_advance_requires_reason() {
    let app = router().await;
    let id = create_item(&app, "standard").await;
    send(&app, "POST", &format!("/api/v1/backlog/{id}/init-stages"), None).await;
    let uri = format!("/api/v1/backlog/{id}/advance-stage");

    let (status, body) = send(&app, "POST", &uri, Some(json!({"force": true}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_REQUEST");

    let (status, body) = send(&app, "POST", &uri, Some(json!({"force": true, "reason": "design signed off offline"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["forced"], true);
    assert_eq!(body["current_stage"], "implement");
}

#[tokio::test]
async fn test_gate_status_query() {
    let app = router().await;
    let id = create_item(&app, "standard").await;

    let (status, body) = send(&app, "GET", &format!("/api/v1/backlog/{id}/gate/status"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["all_met"], true);
    assert_eq!(body["criteria"], json!([]));

    send(&app, "POST", &format!("/api/v1/backlog/{id}/init-stages"), None).await;
    send(
        &app,
        "POST",
        &format!("/api/v1/backlog/{id}/gate/satisfy"),
        Some(json!({"all": true, "satisfied_by": "lead"})),
    )
    .await;

    let (_, body) = send(&app, "GET", &format!("/api/v1/backlog/{id}/gate/status"), None).await;
    assert_eq!(body["stage"], "design");
    assert_eq!(body["all_met"], true);

    let (_, body) = send(&app, "GET", &format!("/api/v1/backlog/{id}/gate/status?stage=verify"), None).await;
    assert_eq!(body["stage"], "verify");
    assert_eq!(body["all_met"], false);
}

#[tokio::test]
async fn test_request_errors() {
    let app = router().await;

    let (status, body) = send(&app, "GET", "/api/v1/backlog/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_ID");

    let missing = uuid::Uuid::new_v4();
    let (status, body) = send(&app, "GET", &format!("/api/v1/backlog/{missing}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let id = create_item(&app, "standard").await;
    let (status, body) = send(&app, "POST", &format!("/api/v1/backlog/{id}/advance-stage"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "STAGES_NOT_INITIALIZED");

    let (status, _) = send(&app, "POST", &format!("/api/v1/backlog/{id}/gate/satisfy"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "POST", "/api/v1/backlog", Some(json!({"model_tier": "economy"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_personas_disabled_without_directory() {
    let app = router().await;
    let (status, body) = send(&app, "GET", "/api/v1/personas", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "PERSONAS_DISABLED");
}

#[tokio::test]
async fn test_personas_filtered_by_capability() {
    let h = Harness::without_velocity().await;
    let directory = StaticDirectory(vec![
        persona("reviewer", &["review", "rust"]),
        persona("tester", &["testing"]),
    ]);
    let app = StagesHttpServer::new(h.service, ServerConfig::default())
        .with_personas(Arc::new(directory))
        .build_router();

    let (status, body) = send(&app, "GET", "/api/v1/personas", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, body) = send(&app, "GET", "/api/v1/personas?capability=REVIEW", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{
        "id": "id-reviewer",
        "slug": "reviewer",
        "name": "REVIEWER",
        "type": "persona",
        "capabilities": ["review", "rust"],
    }]));
}

#[tokio::test]
async fn test_persona_upstream_failure_is_bad_gateway() {
    let h = Harness::without_velocity().await;
    let app = StagesHttpServer::new(h.service, ServerConfig::default())
        .with_personas(Arc::new(UnreachableDirectory))
        .build_router();

    let (status, body) = send(&app, "GET", "/api/v1/personas?capability=review", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "UPSTREAM_ERROR");
}
