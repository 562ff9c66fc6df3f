//! Router assembly: HTTP endpoints, WebSocket upgrade, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
  routing::{get, post},
  Router,
};
use tower_http::{
  cors::{Any, CorsLayer},
  trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws`
/// - REST-ish API under `/api/v1/...`
/// - CORS (allow any origin/method/headers), adjust for production if needed
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
  Router::new()
    // WebSocket
    .route("/ws", get(ws::ws_upgrade))
    // HTTP API
    .route("/api/v1/health", get(http::http_health))
    .route("/api/v1/samples", get(http::http_list_samples))
    .route("/api/v1/samples/:name", get(http::http_get_sample))
    .route("/api/v1/sessions", post(http::http_create_session))
    .route("/api/v1/sessions/:id", get(http::http_get_session))
    .route("/api/v1/sessions/:id/events", post(http::http_post_event))
    .route("/api/v1/sessions/:id/report", get(http::http_get_report))
    .route("/api/v1/scenes/check", post(http::http_check_scene))
    // State + CORS + HTTP tracing
    .with_state(state)
    .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
    .layer(
      TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::GameConfig;
  use axum::body::{to_bytes, Body};
  use axum::http::{Request, StatusCode};
  use serde_json::{json, Value};
  use tower::ServiceExt;

  fn app() -> Router {
    build_router(Arc::new(AppState::with_config(GameConfig::default())))
  }

  async fn call(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let req = Request::builder().method(method).uri(uri).header("content-type", "application/json");
    let req = match body {
      Some(b) => req.body(Body::from(b.to_string())).unwrap(),
      None => req.body(Body::empty()).unwrap(),
    };
    let res = router.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
  }

  #[tokio::test]
  async fn health_and_samples() {
    let router = app();
    let (status, body) = call(&router, "GET", "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["execution"], false);

    let (status, body) = call(&router, "GET", "/api/v1/samples/binary-search", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "binary-search");

    let (status, body) = call(&router, "GET", "/api/v1/samples/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("nope"));
  }

  #[tokio::test]
  async fn session_lifecycle_over_http() {
    let router = app();
    let (status, created) = call(&router, "POST", "/api/v1/sessions", Some(json!({ "sample": "binary-search", "seed": 1 }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["state"]["phase"], "INIT");
    // Answer keys stay on the server.
    assert!(created["round"].get("content").is_none());
    assert!(!created.to_string().contains("isCorrect"));
    let id = created["sessionId"].as_str().unwrap().to_string();

    let events = [
      json!({ "type": "start" }),
      json!({ "type": "begin_selecting" }),
      json!({ "type": "select_line", "line": 4 }),
      json!({ "type": "submit_fix", "optionId": "opt-b" }),
    ];
    let mut last = Value::Null;
    for e in events {
      let (status, body) = call(&router, "POST", &format!("/api/v1/sessions/{id}/events"), Some(e)).await;
      assert_eq!(status, StatusCode::OK);
      last = body;
    }
    assert_eq!(last["state"]["phase"], "FIX_ACCEPTED");
    assert_eq!(last["state"]["scoring"]["total"], 150);

    let (status, report) = call(&router, "GET", &format!("/api/v1/sessions/{id}/report"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["complete"], false);

    let (status, _) = call(&router, "GET", &format!("/api/v1/sessions/{}", uuid::Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn bad_requests_are_rejected() {
    let router = app();
    let (status, _) = call(&router, "POST", "/api/v1/sessions", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, created) = call(&router, "POST", "/api/v1/sessions", Some(json!({ "sample": "duplicate-pairs" }))).await;
    let id = created["sessionId"].as_str().unwrap().to_string();
    let forged = json!({ "type": "verification_resolved", "generation": 0, "itemId": "overall",
      "result": { "passed": true, "checks": [] } });
    let (status, _) = call(&router, "POST", &format!("/api/v1/sessions/{id}/events"), Some(forged)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn scene_check_reports_playability() {
    let router = app();
    let (status, ok) = call(
      &router,
      "POST",
      "/api/v1/scenes/check",
      Some(json!({ "id": "s1", "type": "complexity", "content": crate::seeds::bottleneck_complexity() })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ok["playable"], true);
    assert_eq!(ok["itemCount"], 2);

    let (_, bad) =
      call(&router, "POST", "/api/v1/scenes/check", Some(json!({ "id": "s2", "type": "bug_hunt", "content": {} }))).await;
    assert_eq!(bad["playable"], false);
    assert!(bad["reason"].is_string());
  }
}
