//! Route definitions
//!
//! This module configures the HTTP routes: the WebSocket endpoint, a health
//! check, and the static browser client served from the configured
//! directory.

use std::path::Path;

use axum::routing::get;
use axum::Router;
use tower_http::services::{ServeDir, ServeFile};

use crate::handler::{health, root_handler, ws_handler};
use crate::state::AppState;

/// Creates and configures the Axum application router with all routes
///
/// # Route Definitions
///
/// - `GET /` - WebSocket handshake, or the client's `index.html`
/// - `GET /ws` - WebSocket endpoint for generation jobs
/// - `GET /health` - Liveness probe
/// - Anything else - Static client files; unknown paths get `index.html`
///   so client-side routing keeps working
pub fn create_app(state: AppState) -> Router {
    let static_dir = Path::new(&state.config.static_dir);
    let client = ServeDir::new(static_dir).fallback(ServeFile::new(static_dir.join("index.html")));

    Router::new()
        .route("/", get(root_handler))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .fallback_service(client)
        .with_state(state)
}
