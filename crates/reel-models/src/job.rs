//! Render job definitions and lifecycle state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Maximum length of a caller-supplied job ID.
pub const MAX_JOB_ID_LEN: usize = 128;

/// Unique identifier for a render job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new job ID of the form `job-<unix millis>-<8 hex chars>`.
    pub fn generate() -> Self {
        Self(format!(
            "job-{}-{:08x}",
            Utc::now().timestamp_millis(),
            rand::random::<u32>()
        ))
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check that the ID is safe to embed in storage keys and URL paths.
    ///
    /// Valid IDs are 1-128 chars of ASCII alphanumerics, `-`, `_` and `.`,
    /// and are not made of dots only.
    pub fn is_valid(&self) -> bool {
        let id = self.as_str();
        !id.is_empty()
            && id.len() <= MAX_JOB_ID_LEN
            && !id.chars().all(|c| c == '.')
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Job lifecycle status.
///
/// `pending -> running -> {completed | failed}`; terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Registered, not yet accepted by remote compute
    #[default]
    Pending,
    /// Accepted by remote compute, waiting for callbacks
    Running,
    /// Render finished and output was uploaded
    Completed,
    /// Render failed (or timed out)
    Failed,
}

impl JobStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more transitions accepted).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether `self -> next` is a legal lifecycle edge.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One progress report from the render worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub timestamp: DateTime<Utc>,
    /// Caller-reported percentage; not validated for range or monotonicity.
    pub percent: Option<f64>,
    pub message: Option<String>,
}

/// A requested lifecycle change.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Remote compute accepted the work order.
    Start { runpod_id: String },
    /// Worker reported success. `output_url` overrides the predicted URL when present.
    Complete { output_url: Option<String> },
    /// Worker reported failure, or the watchdog gave up on the job.
    Fail { error: String },
}

impl Transition {
    /// Status this transition moves the job into.
    pub fn target(&self) -> JobStatus {
        match self {
            Transition::Start { .. } => JobStatus::Running,
            Transition::Complete { .. } => JobStatus::Completed,
            Transition::Fail { .. } => JobStatus::Failed,
        }
    }
}

/// Result of applying a transition that did not violate the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The job moved to the new status.
    Applied,
    /// The job was already terminal; nothing changed.
    AlreadyTerminal(JobStatus),
    /// A terminal report arrived before the job was started. It is held on
    /// the job and applied together with the start transition.
    Deferred,
}

impl TransitionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied)
    }
}

/// Illegal lifecycle edge on a non-terminal job (e.g. `pending -> completed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal transition {from} -> {to}")]
pub struct TransitionError {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// A render job tracked by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Channel the inputs were collected from
    pub channel: String,

    /// Lifecycle status
    pub status: JobStatus,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Set once, on the first terminal transition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Caller webhook notified on terminal transitions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,

    /// Public location of the rendered video
    pub output_url: String,

    /// Handle assigned by remote compute
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runpod_id: Option<String>,

    /// Append-only progress history
    #[serde(default)]
    pub progress: Vec<ProgressEntry>,

    /// Error message, only present when failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Terminal report received while still pending
    #[serde(skip)]
    pub deferred: Option<Transition>,
}

impl Job {
    /// Create a new pending job.
    pub fn new(
        id: JobId,
        channel: impl Into<String>,
        callback_url: Option<String>,
        output_url: impl Into<String>,
    ) -> Self {
        Self {
            id,
            channel: channel.into(),
            status: JobStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
            callback_url,
            output_url: output_url.into(),
            runpod_id: None,
            progress: Vec::new(),
            error: None,
            deferred: None,
        }
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply a lifecycle transition.
    ///
    /// Transitions on a terminal job are ignored so that retried callbacks
    /// leave the first outcome in place. A terminal report on a pending job
    /// is held until `Start` lands, then applied in the same call; only the
    /// first held report counts.
    pub fn apply(&mut self, transition: Transition) -> Result<TransitionOutcome, TransitionError> {
        if self.is_terminal() {
            return Ok(TransitionOutcome::AlreadyTerminal(self.status));
        }

        let target = transition.target();
        if self.status == JobStatus::Pending && target.is_terminal() {
            if self.deferred.is_none() {
                self.deferred = Some(transition);
            }
            return Ok(TransitionOutcome::Deferred);
        }

        if !self.status.can_transition_to(target) {
            return Err(TransitionError {
                from: self.status,
                to: target,
            });
        }

        match transition {
            Transition::Start { runpod_id } => {
                self.runpod_id = Some(runpod_id);
            }
            Transition::Complete { output_url } => {
                if let Some(url) = output_url.filter(|u| !u.is_empty()) {
                    self.output_url = url;
                }
                self.completed_at = Some(Utc::now());
            }
            Transition::Fail { error } => {
                self.error = Some(error);
                self.completed_at = Some(Utc::now());
            }
        }
        self.status = target;

        if let Some(held) = self.deferred.take() {
            self.apply(held)?;
        }

        Ok(TransitionOutcome::Applied)
    }

    /// Append a progress entry. Returns `false` (and records nothing) once terminal.
    pub fn record_progress(&mut self, percent: Option<f64>, message: Option<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.progress.push(ProgressEntry {
            timestamp: Utc::now(),
            percent,
            message,
        });
        true
    }

    /// Time of the most recent sign of life: the last progress report, else creation.
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.progress
            .last()
            .map(|p| p.timestamp)
            .unwrap_or(self.created_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_job() -> Job {
        Job::new(
            JobId::from("job-1"),
            "Demo",
            None,
            "https://cdn.example.com/Channels/Demo/finish/final-job-1.mp4",
        )
    }

    #[test]
    fn test_generated_job_id_format() {
        let id = JobId::generate();
        let parts: Vec<&str> = id.as_str().splitn(3, '-').collect();
        assert_eq!(parts[0], "job");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 8);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
        assert!(id.is_valid());
    }

    #[test]
    fn test_job_id_validation() {
        assert!(JobId::from("my-job_01.v2").is_valid());
        assert!(!JobId::from("").is_valid());
        assert!(!JobId::from("..").is_valid());
        assert!(!JobId::from("a/b").is_valid());
        assert!(!JobId::from("has space").is_valid());
        assert!(!JobId::from("a".repeat(129)).is_valid());
    }

    #[test]
    fn test_job_lifecycle() {
        let mut job = pending_job();
        assert_eq!(job.status, JobStatus::Pending);

        let outcome = job
            .apply(Transition::Start {
                runpod_id: "rp-1".into(),
            })
            .unwrap();
        assert!(outcome.is_applied());
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.runpod_id.as_deref(), Some("rp-1"));
        assert!(job.completed_at.is_none());

        job.apply(Transition::Complete {
            output_url: Some("https://cdn.example.com/out.mp4".into()),
        })
        .unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.output_url, "https://cdn.example.com/out.mp4");
        assert!(job.completed_at.is_some());
        assert!(job.error.is_none());
    }

    #[test]
    fn test_complete_without_output_url_keeps_prediction() {
        let mut job = pending_job();
        let predicted = job.output_url.clone();
        job.apply(Transition::Start {
            runpod_id: "rp-1".into(),
        })
        .unwrap();
        job.apply(Transition::Complete { output_url: None }).unwrap();
        assert_eq!(job.output_url, predicted);
    }

    #[test]
    fn test_terminal_state_is_final() {
        let mut job = pending_job();
        job.apply(Transition::Start {
            runpod_id: "rp-1".into(),
        })
        .unwrap();
        job.apply(Transition::Fail {
            error: "gpu oom".into(),
        })
        .unwrap();
        let completed_at = job.completed_at;

        let outcome = job
            .apply(Transition::Complete { output_url: None })
            .unwrap();
        assert_eq!(outcome, TransitionOutcome::AlreadyTerminal(JobStatus::Failed));
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("gpu oom"));
        assert_eq!(job.completed_at, completed_at);
    }

    #[test]
    fn test_second_start_is_illegal() {
        let mut job = pending_job();
        job.apply(Transition::Start {
            runpod_id: "rp-1".into(),
        })
        .unwrap();
        let err = job
            .apply(Transition::Start {
                runpod_id: "rp-2".into(),
            })
            .unwrap_err();
        assert_eq!(err.from, JobStatus::Running);
        assert_eq!(err.to, JobStatus::Running);
        assert_eq!(job.runpod_id.as_deref(), Some("rp-1"));
    }

    #[test]
    fn test_early_completion_is_held_until_start() {
        let mut job = pending_job();
        let outcome = job
            .apply(Transition::Complete {
                output_url: Some("https://cdn.example.com/fast.mp4".into()),
            })
            .unwrap();
        assert_eq!(outcome, TransitionOutcome::Deferred);
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.completed_at.is_none());

        // A later failure report does not replace the first one.
        job.apply(Transition::Fail {
            error: "late".into(),
        })
        .unwrap();

        let outcome = job
            .apply(Transition::Start {
                runpod_id: "rp-1".into(),
            })
            .unwrap();
        assert!(outcome.is_applied());
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.runpod_id.as_deref(), Some("rp-1"));
        assert_eq!(job.output_url, "https://cdn.example.com/fast.mp4");
        assert!(job.error.is_none());
        assert!(job.deferred.is_none());
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn test_progress_is_append_only_and_unordered() {
        let mut job = pending_job();
        assert!(job.record_progress(Some(50.0), Some("half".into())));
        assert!(job.record_progress(Some(10.0), None));
        assert_eq!(job.progress.len(), 2);
        assert_eq!(job.progress[1].percent, Some(10.0));
        assert_eq!(job.last_activity(), job.progress[1].timestamp);
    }

    #[test]
    fn test_progress_ignored_after_terminal() {
        let mut job = pending_job();
        job.apply(Transition::Start {
            runpod_id: "rp-1".into(),
        })
        .unwrap();
        job.apply(Transition::Complete { output_url: None }).unwrap();
        assert!(!job.record_progress(Some(100.0), Some("Done!".into())));
        assert!(job.progress.is_empty());
    }

    #[test]
    fn test_job_serialization_shape() {
        let job = pending_job();
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["id"], "job-1");
        assert_eq!(value["status"], "pending");
        assert_eq!(value["channel"], "Demo");
        assert!(value.get("error").is_none());
        assert!(value.get("runpod_id").is_none());
        assert_eq!(value["progress"], serde_json::json!([]));
    }
}
