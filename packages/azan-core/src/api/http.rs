//! HTTP route handlers.
//!
//! All handlers are thin: they take the shared state lock, delegate to
//! [`SchedulerState`](crate::state::SchedulerState) and serialize the result.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;

use crate::api::AppState;
use crate::error::AzanResult;

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

/// Creates the Axum router with all routes.
///
/// Unknown paths answer 404 with an empty body.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(get_status))
        .route("/mute", get(toggle_mute))
        .fallback(not_found)
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Current and next prayer for the status bar.
///
/// Read-only. Answers 503 until the first time-table has been computed.
async fn get_status(State(app): State<AppState>) -> AzanResult<impl IntoResponse> {
    let now = app.clock.now();
    let snapshot = app
        .state
        .lock()
        .await
        .snapshot(now, &app.config.status_text)?;
    Ok(Json(snapshot))
}

/// Toggles the mute flag, silencing active playback when muting.
async fn toggle_mute(State(app): State<AppState>) -> impl IntoResponse {
    let mute = app.state.lock().await.toggle_mute().await;
    Json(json!({ "mute": mute }))
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}
