//! GlassQuiz backend
//!
//! - Axum HTTP + WebSocket API over the quiz state machine
//! - OpenAI-compatible chat completions for question generation
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT             : u16 (default 3000)
//!   DATA_DIR         : directory for the history log and saved API key (default "./data")
//!   LLM_BASE_URL     : default "https://generativelanguage.googleapis.com/v1beta/openai"
//!   QUIZ_CONFIG_PATH : path to TOML config (prompts, rules, model catalog)
//!   LOG_LEVEL        : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT       : "pretty" (default) or "json"

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};

use glassquiz::routes::build_router;
use glassquiz::state::AppState;
use glassquiz::telemetry;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared state: quiz app, file-backed stores, provider client.
  let state = Arc::new(AppState::from_env()?);

  let app = build_router(state.clone());

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "glassquiz", %addr, "HTTP server listening");
  axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
  info!(target: "glassquiz", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(target: "glassquiz", error = %e, "Failed to listen for Ctrl+C");
    std::future::pending::<()>().await;
  }
}
