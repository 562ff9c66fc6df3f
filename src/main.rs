//! Gamelab · exercise backend
//!
//! - Axum HTTP + WebSocket API over in-memory play sessions
//! - Optional code-execution sandbox (degrades to recorded outputs without it)
//!
//! Important env variables:
//!   PORT                   : u16 (default 3000)
//!   GAME_CONFIG_PATH       : path to TOML config (scoring, bonuses, feedback, execution)
//!   EXECUTION_ENDPOINT     : sandbox URL; overrides the config file
//!   EXECUTION_TIMEOUT_SECS : sandbox request timeout (default 10)
//!   LOG_LEVEL              : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT             : "pretty" (default) or "json"

use std::{net::SocketAddr, sync::Arc};

use tokio::net::TcpListener;
use tracing::info;

use gamelab::routes::build_router;
use gamelab::state::AppState;
use gamelab::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared application state (sessions, settings, sandbox client).
  let state = Arc::new(AppState::new());

  let app = build_router(state.clone());

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "gamelab", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(async {
      let _ = tokio::signal::ctrl_c().await;
      info!(target: "gamelab", "Shutdown signal received");
    })
    .await?;
  Ok(())
}
