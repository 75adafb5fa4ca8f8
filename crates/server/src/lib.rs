//! Livepad Server
//!
//! Live TypeScript playground backend. Browser edits arrive over a WebSocket,
//! are compiled and published to a per-user workspace, and the preview frame
//! is told to reload.

pub mod compiler;
pub mod config;
pub mod cookie;
pub mod logging;
pub mod mime;
pub mod pipeline;
pub mod preview;
pub mod session;
pub mod state;
pub mod store;
pub mod websocket;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::cookie::{session_cookie, session_token};
use crate::preview::preview_handler;
use crate::state::AppState;
use crate::websocket::ws_handler;

/// Build the HTTP router for the given state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/session", get(session_handler))
        .route("/preview/{user_id}/{*file}", get(preview_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Resolve (or mint) the caller's session and set the cookie when new.
async fn session_handler(headers: HeaderMap, State(state): State<Arc<AppState>>) -> Response {
    let presented = session_token(&headers);
    let session = state.sessions.resolve(presented.as_deref());
    let body = Json(json!({ "new": session.is_new }));
    if session.is_new {
        ([(SET_COOKIE, session_cookie(&session.token))], body).into_response()
    } else {
        body.into_response()
    }
}

async fn health_handler() -> impl IntoResponse {
    "OK"
}
