//! Router assembly: HTTP endpoints, WebSocket updates, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket snapshot stream at `/ws`
/// - REST-ish API under `/api/v1/...`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        .route("/ws", get(ws::ws_upgrade))
        .route("/api/v1/health", get(http::http_health))
        .route(
            "/api/v1/credential",
            get(http::http_get_credential)
                .put(http::http_put_credential)
                .delete(http::http_delete_credential),
        )
        .route("/api/v1/models", get(http::http_get_models))
        .route("/api/v1/quiz", get(http::http_get_quiz))
        .route("/api/v1/quiz/generate", post(http::http_post_generate))
        .route("/api/v1/quiz/answer", post(http::http_post_answer))
        .route("/api/v1/quiz/retry", post(http::http_post_retry))
        .route("/api/v1/quiz/reset", post(http::http_post_reset))
        .route("/api/v1/quiz/report", get(http::http_get_report))
        .route("/api/v1/history", get(http::http_get_history).delete(http::http_delete_history))
        .route("/api/v1/history/:id/load", post(http::http_post_history_load))
        .route("/api/v1/companion", get(http::http_get_companion))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .fallback_service(static_service)
}
