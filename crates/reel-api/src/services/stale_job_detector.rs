//! Background watchdog for renders that never call back.
//!
//! Periodically force-fails `running` jobs whose last sign of life (latest
//! progress report, else creation) is older than the configured timeout. The
//! failure goes through the same path as a worker callback, so the caller's
//! webhook is notified. Disabled unless `JOB_TIMEOUT_SECS` is set.

use std::time::Duration;

use chrono::Utc;
use tokio::time::interval;
use tracing::{error, info, warn};

use reel_models::{JobStatus, Transition};
use reel_registry::RegistryResult;

use crate::metrics;
use crate::services::JobService;

/// Stale job detector service.
pub struct StaleJobDetector {
    jobs: JobService,
    timeout: Duration,
    interval: Duration,
}

impl StaleJobDetector {
    pub fn new(jobs: JobService, timeout: Duration, interval: Duration) -> Self {
        Self {
            jobs,
            timeout,
            interval,
        }
    }

    /// Error recorded on jobs the watchdog gives up on.
    pub fn timeout_message(&self) -> String {
        format!(
            "Render timed out: no callback within {}s",
            self.timeout.as_secs()
        )
    }

    /// Start the background detection loop.
    ///
    /// Runs indefinitely; spawn it as a background task.
    pub async fn run(&self) {
        info!(
            "Starting stale job detector (timeout: {:?}, interval: {:?})",
            self.timeout, self.interval
        );

        let mut ticker = interval(self.interval);

        loop {
            ticker.tick().await;

            match self.check_once().await {
                Ok(0) => {}
                Ok(n) => info!("Stale job detection complete: {} timed out", n),
                Err(e) => error!("Stale job detection error: {}", e),
            }
        }
    }

    /// Run a single sweep. Returns how many jobs were force-failed.
    pub async fn check_once(&self) -> RegistryResult<u32> {
        let now = Utc::now();
        let mut timed_out = 0u32;

        for job in self.jobs.registry().jobs_with_status(JobStatus::Running).await? {
            let silent_for = (now - job.last_activity()).to_std().unwrap_or_default();
            if silent_for <= self.timeout {
                continue;
            }

            warn!(
                job_id = %job.id,
                channel = %job.channel,
                runpod_id = ?job.runpod_id,
                silent_secs = silent_for.as_secs(),
                "Detected stale job (no callback)"
            );

            let failed = self
                .jobs
                .finish(
                    &job.id,
                    Transition::Fail {
                        error: self.timeout_message(),
                    },
                )
                .await;

            // A callback may have landed between the listing and the transition.
            if failed.is_some() {
                timed_out += 1;
                metrics::record_job_timed_out();
            }
        }

        Ok(timed_out)
    }
}
