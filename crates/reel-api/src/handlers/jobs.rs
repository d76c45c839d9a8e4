//! Job creation, status polling and progress ingestion.

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use reel_models::{Job, JobId};

use crate::error::{ApiError, ApiResult};
use crate::services::{CreateJobRequest, CreatedJob, ProgressReport};
use crate::state::AppState;

/// Acknowledgement returned to the worker.
#[derive(Debug, Serialize)]
pub struct Ack {
    pub ok: bool,
}

impl Ack {
    pub fn ok() -> Json<Self> {
        Json(Self { ok: true })
    }
}

/// POST /jobs
///
/// Collects the channel's inputs, mints grants and dispatches the render.
///
/// Returns:
/// - 200: Job dispatched and running
/// - 400: Missing/invalid fields, or no frames in the channel
/// - 409: `job_id` already registered
/// - 502: Remote compute refused the work order
pub async fn create_job(
    State(state): State<AppState>,
    payload: Result<Json<CreateJobRequest>, JsonRejection>,
) -> ApiResult<Json<CreatedJob>> {
    let Json(request) = payload.map_err(|e| ApiError::validation(e.body_text()))?;
    let created = state.jobs.create(request).await?;
    Ok(Json(created))
}

/// GET /jobs/:job_id
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<Job>> {
    let job = state.jobs.get(&JobId::from(job_id)).await?;
    Ok(Json(job))
}

/// POST /jobs/:job_id/progress
///
/// Acknowledges any readable report, even for a job this process does not
/// know. The content type is not checked.
///
/// Returns:
/// - 200: `{ "ok": true }`
/// - 404: Body is not a JSON object
pub async fn report_progress(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Ack>> {
    let report = ProgressReport::from_body(&body)
        .ok_or_else(|| ApiError::not_found("Malformed progress report"))?;
    state.jobs.record_progress(&JobId::from(job_id), report).await;
    Ok(Ack::ok())
}
