//! WebSocket upgrade + message loop. The client receives a snapshot on connect
//! and after every state change; answers and pings are handled inline.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, instrument, warn};

use crate::protocol::{selection, ClientWsMessage, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip(ws, state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "glassquiz", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn send(socket: &mut WebSocket, msg: &ServerWsMessage) -> bool {
  let out = serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "kind": "serialization", "message": format!("Serialization error: {}", e) }).to_string()
  });
  match socket.send(Message::Text(out)).await {
    Ok(()) => true,
    Err(e) => {
      error!(target: "glassquiz", error = %e, "WS send error");
      false
    }
  }
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "glassquiz", "WebSocket connected");
  let mut updates = state.subscribe();

  if !send(&mut socket, &ServerWsMessage::Snapshot { snapshot: state.snapshot() }).await {
    return;
  }

  loop {
    tokio::select! {
      incoming = socket.recv() => {
        let Some(Ok(msg)) = incoming else { break };
        match msg {
          Message::Text(txt) => {
            let reply = match serde_json::from_str::<ClientWsMessage>(&txt) {
              Ok(incoming) => {
                debug!(target: "glassquiz", "WS received: {:?}", &incoming);
                handle_client_ws(incoming, &state)
              }
              Err(e) => Some(ServerWsMessage::Error { kind: "invalid_input", message: format!("Invalid JSON: {}", e) }),
            };
            if let Some(reply) = reply {
              if !send(&mut socket, &reply).await {
                break;
              }
            }
          }
          Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
          Message::Close(_) => break,
          _ => {}
        }
      }
      update = updates.recv() => {
        match update {
          Ok(snapshot) => {
            if !send(&mut socket, &ServerWsMessage::Snapshot { snapshot }).await {
              break;
            }
          }
          Err(RecvError::Lagged(skipped)) => {
            // Catch up with the current state instead of replaying.
            warn!(target: "glassquiz", skipped, "WS subscriber lagged");
            if !send(&mut socket, &ServerWsMessage::Snapshot { snapshot: state.snapshot() }).await {
              break;
            }
          }
          Err(RecvError::Closed) => break,
        }
      }
    }
  }
  info!(target: "glassquiz", "WebSocket disconnected");
}

/// Returns a direct reply, or None when the broadcast snapshot is the reply.
fn handle_client_ws(msg: ClientWsMessage, state: &Arc<AppState>) -> Option<ServerWsMessage> {
  match msg {
    ClientWsMessage::Ping => Some(ServerWsMessage::Pong),
    ClientWsMessage::Snapshot => Some(ServerWsMessage::Snapshot { snapshot: state.snapshot() }),
    ClientWsMessage::Answer { selected_index } => {
      match state.transition(|app, now| app.submit_answer(selection(selected_index), now)) {
        Ok((outcome, _)) => {
          info!(target: "session", correct = outcome.record.is_correct, timed_out = outcome.timed_out, "WS answer recorded");
          None
        }
        Err(e) => Some(ServerWsMessage::Error { kind: e.kind(), message: e.to_string() }),
      }
    }
  }
}
