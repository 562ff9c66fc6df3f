//! WebSocket upgrade + message loop. Each connection owns at most one session,
//! created by `start` and dropped on disconnect. We reply with one JSON message per request.

use std::sync::Arc;

use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "gamelab", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "gamelab", "WebSocket connected");
  let mut session: Option<Uuid> = None;
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "gamelab", "WS received: {:?}", &incoming);
            handle_client_ws(incoming, &state, &mut session).await
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "gamelab", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => {
        let _ = socket.send(Message::Pong(payload)).await;
      }
      Message::Close(_) => break,
      _ => {}
    }
  }
  if let Some(id) = session {
    state.remove(id).await;
  }
  info!(target: "gamelab", "WebSocket disconnected");
}

async fn handle_client_ws(msg: ClientWsMessage, state: &AppState, session: &mut Option<Uuid>) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::Start(req) => match state.create_session(req).await {
      Ok(view) => {
        // A new start replaces the connection's previous session.
        if let Some(old) = session.replace(view.session_id) {
          state.remove(old).await;
        }
        ServerWsMessage::State { view }
      }
      Err(e) => ServerWsMessage::Error { message: e.to_string() },
    },

    ClientWsMessage::Event { event } => {
      let Some(id) = *session else {
        return ServerWsMessage::Error { message: "No session; send start first.".into() };
      };
      match state.dispatch(id, event).await {
        Ok(view) => ServerWsMessage::State { view },
        Err(e) => ServerWsMessage::Error { message: e.to_string() },
      }
    }

    ClientWsMessage::Report => {
      let Some(id) = *session else {
        return ServerWsMessage::Error { message: "No session; send start first.".into() };
      };
      match state.report(id).await {
        Ok(report) => ServerWsMessage::Report(report),
        Err(e) => ServerWsMessage::Error { message: e.to_string() },
      }
    }
  }
}
