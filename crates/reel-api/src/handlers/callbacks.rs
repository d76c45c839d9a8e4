//! Worker completion/failure receiver.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use tracing::warn;

use crate::handlers::jobs::Ack;
use crate::services::WorkerCallback;
use crate::state::AppState;

/// POST /internal/callback
///
/// Never rejects: a non-2xx here could make the worker retry forever or
/// treat a finished render as failed.
pub async fn worker_callback(
    State(state): State<AppState>,
    payload: Result<Json<WorkerCallback>, JsonRejection>,
) -> Json<Ack> {
    match payload {
        Ok(Json(callback)) => state.jobs.handle_callback(callback).await,
        Err(e) => warn!("Malformed worker callback ignored: {}", e.body_text()),
    }
    Ack::ok()
}
