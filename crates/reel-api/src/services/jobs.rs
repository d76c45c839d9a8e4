//! Job orchestration: creation, progress ingestion and terminal callbacks.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use url::Url;

use reel_dispatch::ComputeBackend;
use reel_models::{
    Job, JobId, JobStatus, OutputTarget, RenderParamsRequest, Transition, WorkOrder,
};
use reel_registry::{JobRegistry, RegistryError};
use reel_storage::channel::is_valid_channel;
use reel_storage::AssetLocator;

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::services::Notifier;

/// `POST /jobs` body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateJobRequest {
    /// Kept untyped so a non-string channel gets the same error as a missing one
    #[serde(default)]
    pub channel: Option<serde_json::Value>,
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub callback_url: Option<String>,
    #[serde(default)]
    pub params: Option<RenderParamsRequest>,
}

/// `POST /jobs` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedJob {
    pub job_id: String,
    pub status: JobStatus,
    pub channel: String,
    pub runpod_id: String,
    pub output_url: String,
    pub status_url: String,
}

/// Worker progress report.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProgressReport {
    #[serde(default)]
    pub percent: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ProgressReport {
    /// Read a report from a raw request body, whatever its content type.
    ///
    /// `percent` may be a number or a numeric string such as `"50"` or
    /// `"50%"`; anything else is dropped rather than rejected. Returns
    /// `None` only when the body is not a JSON object.
    pub fn from_body(body: &[u8]) -> Option<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Some(Self::default());
        }
        let value: serde_json::Value = serde_json::from_slice(body).ok()?;
        let fields = value.as_object()?;

        let percent = match fields.get("percent") {
            Some(serde_json::Value::Number(n)) => n.as_f64(),
            Some(serde_json::Value::String(s)) => {
                s.trim().trim_end_matches('%').trim_end().parse::<f64>().ok()
            }
            _ => None,
        };
        let message = fields
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string);

        Some(Self { percent, message })
    }
}

/// Worker completion/failure notification.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkerCallback {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub output_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

const DEFAULT_FAILURE: &str = "Render failed";

/// Drives a job through locate, grant, register and dispatch, and applies
/// everything the worker reports afterwards.
#[derive(Clone)]
pub struct JobService {
    config: ApiConfig,
    locator: AssetLocator,
    registry: JobRegistry,
    compute: Arc<dyn ComputeBackend>,
    notifier: Notifier,
}

impl JobService {
    pub fn new(
        config: ApiConfig,
        locator: AssetLocator,
        registry: JobRegistry,
        compute: Arc<dyn ComputeBackend>,
        notifier: Notifier,
    ) -> Self {
        Self {
            config,
            locator,
            registry,
            compute,
            notifier,
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Create and dispatch a job.
    ///
    /// Either the whole chain succeeds and a `running` job exists, or an
    /// error is returned and no record is left behind.
    pub async fn create(&self, request: CreateJobRequest) -> ApiResult<CreatedJob> {
        let channel = match request.channel.as_ref().and_then(|v| v.as_str()) {
            Some(c) if !c.trim().is_empty() => c.to_string(),
            _ => {
                return Err(ApiError::validation(
                    "Missing or invalid required field: channel",
                ))
            }
        };
        if !is_valid_channel(&channel) {
            return Err(ApiError::validation(format!(
                "Invalid channel name: {}",
                channel
            )));
        }

        let job_id = match request.job_id.filter(|id| !id.is_empty()) {
            Some(id) => {
                let id = JobId::from(id);
                if !id.is_valid() {
                    return Err(ApiError::validation(
                        "Invalid job_id: expected 1-128 characters of [A-Za-z0-9_.-]",
                    ));
                }
                id
            }
            None => JobId::generate(),
        };

        let callback_url = request
            .callback_url
            .filter(|u| !u.is_empty())
            .map(|u| validate_callback_url(&u).map(|_| u))
            .transpose()?;

        let params = request.params.unwrap_or_default().resolve();

        info!(job_id = %job_id, channel = %channel, "Creating render job");

        let inputs = self
            .locator
            .collect_channel_inputs(&channel)
            .await
            .inspect_err(|e| {
                warn!(job_id = %job_id, channel = %channel, "Failed to collect channel inputs: {}", e);
                metrics::record_job_rejected("inputs");
            })?;

        let output = self
            .locator
            .prepare_output(&channel, job_id.as_str())
            .await?;
        debug!(job_id = %job_id, key = %output.key, public_url = %output.public_url, "Prepared output");

        self.registry
            .create(
                job_id.clone(),
                &channel,
                callback_url,
                &output.public_url,
            )
            .await
            .inspect_err(|_| metrics::record_job_rejected("duplicate"))?;

        let order = WorkOrder {
            job_id: job_id.to_string(),
            channel: channel.clone(),
            inputs,
            params,
            output: OutputTarget {
                put_url: output.put_url,
                public_url: output.public_url,
            },
            progress_url: self.config.progress_url(job_id.as_str()),
            orchestrator_callback: self.config.callback_url(),
        };

        info!(
            job_id = %job_id,
            payload = %order.inputs.summary(),
            "Submitting work order"
        );

        let started = Instant::now();
        let submitted = self.compute.submit(&order).await;
        metrics::record_dispatch_duration(started.elapsed().as_secs_f64());

        let handle = match submitted {
            Ok(handle) => handle,
            Err(e) => {
                error!(job_id = %job_id, "Dispatch rejected: {}", e);
                metrics::record_dispatch_failure(e.http_status());
                metrics::record_job_rejected("dispatch");
                if let Err(rollback) = self.registry.discard_pending(&job_id).await {
                    error!(job_id = %job_id, "Failed to roll back job: {}", rollback);
                }
                return Err(e.into());
            }
        };

        let started = self
            .registry
            .transition(
                &job_id,
                Transition::Start {
                    runpod_id: handle.id.clone(),
                },
            )
            .await?;
        metrics::record_job_created();

        let status = started.job.status;
        let output_url = started.job.output_url.clone();
        if started.job.is_terminal() {
            // The worker reported back before the submit response arrived.
            info!(job_id = %job_id, status = %status, "Render job finished during dispatch");
            self.settled(started.job);
        } else {
            info!(job_id = %job_id, runpod_id = %handle.id, "Render job running");
        }

        Ok(CreatedJob {
            job_id: job_id.to_string(),
            status,
            channel,
            runpod_id: handle.id,
            status_url: self.config.status_url(job_id.as_str()),
            output_url,
        })
    }

    /// Snapshot of a job.
    pub async fn get(&self, job_id: &JobId) -> ApiResult<Job> {
        self.registry.get(job_id).await.map_err(|e| match e {
            RegistryError::NotFound(_) => ApiError::not_found("Job not found"),
            other => other.into(),
        })
    }

    /// Append a worker progress report. Unknown jobs are logged and ignored.
    pub async fn record_progress(&self, job_id: &JobId, report: ProgressReport) {
        info!(
            job_id = %job_id,
            percent = ?report.percent,
            message = ?report.message,
            "Progress"
        );

        match self
            .registry
            .append_progress(job_id, report.percent, report.message)
            .await
        {
            Ok(_) => {}
            Err(RegistryError::NotFound(_)) => {
                warn!(job_id = %job_id, "Progress for unknown job ignored");
            }
            Err(e) => {
                error!(job_id = %job_id, "Failed to record progress: {}", e);
            }
        }
    }

    /// Apply a worker completion/failure notification. Never fails.
    pub async fn handle_callback(&self, callback: WorkerCallback) {
        let Some(job_id) = callback.job_id.filter(|id| !id.is_empty()) else {
            warn!("Callback without job_id ignored");
            return;
        };
        let job_id = JobId::from(job_id);

        let transition = match callback.status.as_deref() {
            Some("completed") => Transition::Complete {
                output_url: callback.output_url,
            },
            Some("failed") => Transition::Fail {
                error: callback
                    .error
                    .filter(|e| !e.is_empty())
                    .unwrap_or_else(|| DEFAULT_FAILURE.to_string()),
            },
            other => {
                warn!(job_id = %job_id, status = ?other, "Callback with unsupported status ignored");
                return;
            }
        };

        info!(job_id = %job_id, status = %transition.target(), "Callback received");
        self.finish(&job_id, transition).await;
    }

    /// Move a job into a terminal state and notify the caller if this call
    /// made the change. Returns the job when the transition was applied.
    pub async fn finish(&self, job_id: &JobId, transition: Transition) -> Option<Job> {
        match self.registry.transition(job_id, transition).await {
            Ok(result) if result.outcome.is_applied() => {
                self.settled(result.job.clone());
                Some(result.job)
            }
            Ok(_) => None,
            Err(RegistryError::NotFound(_)) => {
                warn!(job_id = %job_id, "Callback for unknown job ignored");
                None
            }
            Err(e @ RegistryError::InvalidTransition { .. }) => {
                warn!(job_id = %job_id, "Callback rejected by lifecycle: {}", e);
                None
            }
            Err(e) => {
                error!(job_id = %job_id, "Failed to apply callback: {}", e);
                None
            }
        }
    }

    /// Record the terminal metric and notify the caller in the background.
    fn settled(&self, job: Job) {
        match job.status {
            JobStatus::Completed => metrics::record_job_completed(),
            JobStatus::Failed => metrics::record_job_failed(),
            _ => {}
        }
        self.notifier.notify_in_background(job);
    }
}

fn validate_callback_url(raw: &str) -> ApiResult<Url> {
    let url = Url::parse(raw)
        .map_err(|e| ApiError::validation(format!("Invalid callback_url: {}", e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(ApiError::validation(format!(
            "Invalid callback_url: unsupported scheme {}",
            scheme
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_report_is_read_leniently() {
        let report = ProgressReport::from_body(br#"{"percent": 40, "message": "Rendering"}"#);
        assert_eq!(
            report,
            Some(ProgressReport {
                percent: Some(40.0),
                message: Some("Rendering".into()),
            })
        );

        let report = ProgressReport::from_body(br#"{"percent": " 50% ", "message": "x"}"#).unwrap();
        assert_eq!(report.percent, Some(50.0));

        let report = ProgressReport::from_body(br#"{"percent": "half", "message": 7}"#).unwrap();
        assert_eq!(report, ProgressReport::default());

        assert_eq!(ProgressReport::from_body(b""), Some(ProgressReport::default()));
        assert_eq!(ProgressReport::from_body(b"{}"), Some(ProgressReport::default()));
        assert!(ProgressReport::from_body(b"percent=50").is_none());
        assert!(ProgressReport::from_body(b"[50]").is_none());
    }

    #[test]
    fn test_callback_url_validation() {
        assert!(validate_callback_url("https://n8n.example.com/webhook/render-done").is_ok());
        assert!(validate_callback_url("http://localhost:5678/hook").is_ok());
        assert!(validate_callback_url("ftp://example.com/x").is_err());
        assert!(validate_callback_url("/relative/path").is_err());
        assert!(validate_callback_url("not a url").is_err());
    }

    #[test]
    fn test_create_request_accepts_untyped_channel() {
        let request: CreateJobRequest =
            serde_json::from_str(r#"{"channel": 42, "params": {"fps": 60}}"#).unwrap();
        assert!(request.channel.unwrap().as_str().is_none());
        assert_eq!(request.params.unwrap().fps, Some(60));
    }
}
