//! Business logic services.

pub mod jobs;
pub mod notifier;
pub mod stale_job_detector;

pub use jobs::{CreateJobRequest, CreatedJob, JobService, ProgressReport, WorkerCallback};
pub use notifier::{Notifier, TerminalNotification};
pub use stale_job_detector::StaleJobDetector;
