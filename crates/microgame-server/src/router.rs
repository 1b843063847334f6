//! Axum router construction for the coordinator.
//!
//! Assembles the game socket and the HTTP endpoints into a single
//! [`Router`] with permissive CORS, since browser clients may be served
//! from any origin.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router.
///
/// The router includes:
/// - `GET /game` -- game `WebSocket`
/// - `GET /healthz` -- liveness probe
/// - `GET /api/status` -- session status
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/game", get(ws::ws_game))
        .route("/healthz", get(handlers::healthz))
        .route("/api/status", get(handlers::status))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
