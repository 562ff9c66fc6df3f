//! HTTP endpoint handlers. These are thin wrappers that forward to the session store.
//! Each handler is instrumented and logs ids and basic result info, never blueprint contents.

use std::sync::Arc;

use axum::{
  extract::{Path, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde_json::Value;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::GameError;
use crate::machine::Event;
use crate::progression::{check_scene, SceneDescriptor};
use crate::protocol::*;
use crate::seeds;
use crate::state::AppState;

impl IntoResponse for GameError {
  fn into_response(self) -> Response {
    let status = match &self {
      GameError::SessionNotFound(_) | GameError::SampleNotFound(_) => StatusCode::NOT_FOUND,
      GameError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
      GameError::Sandbox(_) => StatusCode::BAD_GATEWAY,
      GameError::ConfigRead { .. } | GameError::ConfigParse { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn!(target: "gamelab", %status, error = %self, "Request failed");
    (status, Json(ErrorOut { error: self.to_string() })).into_response()
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, execution: state.sandbox.is_some() })
}

#[instrument(level = "info")]
pub async fn http_list_samples() -> impl IntoResponse {
  Json(SamplesOut { names: seeds::SAMPLE_NAMES.to_vec() })
}

#[instrument(level = "info")]
pub async fn http_get_sample(Path(name): Path<String>) -> Result<Json<Value>, GameError> {
  seeds::sample(&name).map(Json).ok_or(GameError::SampleNotFound(name))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_create_session(
  State(state): State<Arc<AppState>>,
  Json(body): Json<CreateSessionIn>,
) -> Result<impl IntoResponse, GameError> {
  let view = state.create_session(body).await?;
  Ok((StatusCode::CREATED, Json(view)))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_session(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, GameError> {
  state.view(id).await.map(Json)
}

#[instrument(level = "info", skip(state, event))]
pub async fn http_post_event(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
  Json(event): Json<Event>,
) -> Result<Json<SessionView>, GameError> {
  let view = state.dispatch(id, event).await?;
  info!(target: "exercise", %id, phase = ?view.state.phase, total = view.state.scoring.total, "HTTP event applied");
  Ok(Json(view))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_report(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
) -> Result<Json<ReportOut>, GameError> {
  state.report(id).await.map(Json)
}

#[instrument(level = "info", skip(body), fields(scene = %body.id, kind = %body.kind))]
pub async fn http_check_scene(Json(body): Json<SceneDescriptor>) -> impl IntoResponse {
  let out = SceneCheckOut::new(&body.id, &check_scene(&body));
  info!(target: "exercise", scene = %out.id, playable = out.playable, "Scene checked");
  Json(out)
}
