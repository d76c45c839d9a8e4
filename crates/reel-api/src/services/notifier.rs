//! Caller webhook delivery.
//!
//! Delivery is best effort: the registry and `GET /jobs/:id` stay the source
//! of truth, so a failed POST is logged and dropped.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::{error, info, warn};

use reel_models::{Job, JobStatus};

use crate::metrics;

/// Body POSTed to the caller's `callback_url` on a terminal transition.
#[derive(Debug, Serialize)]
pub struct TerminalNotification<'a> {
    pub job_id: &'a str,
    pub status: JobStatus,
    pub channel: &'a str,
    pub output_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
}

impl<'a> TerminalNotification<'a> {
    pub fn for_job(job: &'a Job) -> Self {
        Self {
            job_id: job.id.as_str(),
            status: job.status,
            channel: &job.channel,
            output_url: &job.output_url,
            error: job.error.as_deref(),
        }
    }
}

/// Relays terminal job outcomes to caller webhooks.
#[derive(Clone)]
pub struct Notifier {
    http: Client,
}

impl Notifier {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("reel-api/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http })
    }

    /// Deliver in a detached task; the caller never waits on the webhook.
    pub fn notify_in_background(&self, job: Job) {
        if job.callback_url.is_none() {
            return;
        }
        let notifier = self.clone();
        tokio::spawn(async move {
            notifier.deliver(&job).await;
        });
    }

    /// POST the outcome of `job` to its callback URL. Returns whether the
    /// webhook acknowledged with a 2xx.
    pub async fn deliver(&self, job: &Job) -> bool {
        let Some(url) = job.callback_url.as_deref() else {
            return false;
        };

        info!(job_id = %job.id, callback_url = %url, status = %job.status, "Sending caller notification");

        match self
            .http
            .post(url)
            .json(&TerminalNotification::for_job(job))
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                info!(job_id = %job.id, status = %response.status(), "Caller notification delivered");
                true
            }
            Ok(response) => {
                warn!(
                    job_id = %job.id,
                    status = %response.status(),
                    "Caller webhook answered with an error status"
                );
                metrics::record_notify_failure();
                false
            }
            Err(e) => {
                error!(job_id = %job.id, "Failed to send caller notification: {}", e);
                metrics::record_notify_failure();
                false
            }
        }
    }
}
