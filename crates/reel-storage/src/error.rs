//! Storage error types.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to configure storage client: {0}")]
    ConfigError(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("No frames found in channel {0}")]
    ChannelInput(String),

    #[error("List failed: {0}")]
    ListFailed(String),

    #[error("Presign failed: {0}")]
    PresignFailed(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("AWS SDK error: {0}")]
    AwsSdk(String),
}

impl StorageError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn access_denied(resource: impl Into<String>) -> Self {
        Self::AccessDenied(resource.into())
    }

    pub fn channel_input(channel: impl Into<String>) -> Self {
        Self::ChannelInput(channel.into())
    }

    /// True when the failure is caused by the request itself (bad channel,
    /// missing permission) rather than by the storage service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            StorageError::AccessDenied(_) | StorageError::ChannelInput(_) | StorageError::InvalidKey(_)
        )
    }
}
