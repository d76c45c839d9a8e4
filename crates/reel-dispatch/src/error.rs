//! Dispatch error types.

use thiserror::Error;

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Errors that can occur while submitting a work order.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Dispatch not configured: {0}")]
    Config(String),

    #[error("Compute service rejected submission ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl DispatchError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn rejected(status: u16, body: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            body: body.into(),
        }
    }

    /// HTTP status returned by the compute service, if it answered at all.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            DispatchError::Rejected { status, .. } => Some(*status),
            DispatchError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
