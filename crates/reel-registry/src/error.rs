//! Registry error types.

use thiserror::Error;

use reel_models::TransitionError;

pub type RegistryResult<T> = Result<T, RegistryError>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job already exists: {0}")]
    AlreadyExists(String),

    #[error("Job {job_id}: {source}")]
    InvalidTransition {
        job_id: String,
        #[source]
        source: TransitionError,
    },

    #[error("Job {0} is no longer pending")]
    NotPending(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl RegistryError {
    pub fn not_found(job_id: impl Into<String>) -> Self {
        Self::NotFound(job_id.into())
    }

    pub fn already_exists(job_id: impl Into<String>) -> Self {
        Self::AlreadyExists(job_id.into())
    }
}
