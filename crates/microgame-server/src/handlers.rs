//! HTTP endpoint handlers.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/healthz` | Liveness probe |
//! | `GET` | `/api/status` | Session counters and available icons |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;

use crate::registry::SessionStats;
use crate::state::AppState;

/// Response body for `GET /api/status`.
#[derive(Debug, serde::Serialize)]
pub struct StatusResponse {
    /// Session counters.
    #[serde(flatten)]
    pub stats: SessionStats,
    /// Icons nobody holds, in catalog order.
    pub available_icons: Vec<String>,
    /// Scripted message types the console can replay.
    pub scripted_types: Vec<String>,
    /// ISO 8601 timestamp of server start.
    pub started_at: String,
}

/// Liveness probe.
pub async fn healthz() -> &'static str {
    "ok"
}

/// Report the current session state.
pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let stats = state.registry.stats().await;
    let available_icons = state.icons.available().await;
    Json(StatusResponse {
        stats,
        available_icons,
        scripted_types: state.scripts.types().map(str::to_owned).collect(),
        started_at: state.started_at.to_rfc3339(),
    })
}
