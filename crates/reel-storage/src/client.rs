//! R2 client implementation.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::store::ObjectStore;

/// S3 error codes that mean the credential is not allowed to touch the resource.
const ACCESS_DENIED_CODES: &[&str] = &[
    "AccessDenied",
    "Forbidden",
    "InvalidAccessKeyId",
    "SignatureDoesNotMatch",
];

/// Configuration for R2 client.
#[derive(Debug, Clone)]
pub struct R2Config {
    /// R2 endpoint URL (S3 API endpoint)
    pub endpoint_url: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket name
    pub bucket_name: String,
    /// Region (usually "auto" for R2)
    pub region: String,
    /// Base URL under which bucket objects are publicly readable
    pub public_base_url: String,
}

impl R2Config {
    /// Create config from environment variables.
    ///
    /// The endpoint comes from `R2_ENDPOINT_URL`, or is derived from `R2_ACCOUNT_ID`.
    pub fn from_env() -> StorageResult<Self> {
        let endpoint_url = match std::env::var("R2_ENDPOINT_URL") {
            Ok(url) => url,
            Err(_) => {
                let account = std::env::var("R2_ACCOUNT_ID").map_err(|_| {
                    StorageError::config_error("R2_ENDPOINT_URL or R2_ACCOUNT_ID must be set")
                })?;
                format!("https://{}.r2.cloudflarestorage.com", account)
            }
        };

        Ok(Self {
            endpoint_url,
            access_key_id: std::env::var("R2_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("R2_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("R2_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("R2_SECRET_ACCESS_KEY not set"))?,
            bucket_name: std::env::var("R2_BUCKET")
                .or_else(|_| std::env::var("R2_BUCKET_NAME"))
                .unwrap_or_else(|_| "genis".to_string()),
            region: std::env::var("R2_REGION").unwrap_or_else(|_| "auto".to_string()),
            public_base_url: std::env::var("R2_PUBLIC_BASE")
                .map_err(|_| StorageError::config_error("R2_PUBLIC_BASE not set"))?,
        })
    }
}

/// Cloudflare R2 storage client.
#[derive(Clone)]
pub struct R2Client {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl R2Client {
    /// Create a new R2 client from configuration.
    pub fn new(config: R2Config) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "r2",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket_name,
            public_base_url: config.public_base_url,
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self::new(R2Config::from_env()?))
    }

    /// Bucket this client operates on.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// List object keys with a prefix, following continuation tokens.
    pub async fn list_objects(&self, prefix: &str) -> StorageResult<Vec<String>> {
        debug!("Listing objects with prefix: {}", prefix);

        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);

            if let Some(token) = continuation_token {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| sdk_error(e, prefix, StorageError::ListFailed))?;

            keys.extend(
                response
                    .contents()
                    .iter()
                    .filter_map(|obj| obj.key().map(str::to_string)),
            );

            if response.is_truncated() == Some(true) {
                continuation_token = response.next_continuation_token().map(str::to_string);
            } else {
                break;
            }
        }

        Ok(keys)
    }

    /// Generate a presigned URL for GET.
    pub async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        let presign_config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(|e| sdk_error(e, key, StorageError::PresignFailed))?;

        Ok(presigned.uri().to_string())
    }

    /// Generate a presigned URL for PUT with a fixed content type.
    pub async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        let presign_config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .presigned(presign_config)
            .await
            .map_err(|e| sdk_error(e, key, StorageError::PresignFailed))?;

        Ok(presigned.uri().to_string())
    }
}

#[async_trait]
impl ObjectStore for R2Client {
    async fn list_keys(&self, prefix: &str) -> StorageResult<Vec<String>> {
        self.list_objects(prefix).await
    }

    async fn grant_read(&self, key: &str, ttl: Duration) -> StorageResult<String> {
        self.presign_get(key, ttl).await
    }

    async fn grant_write(
        &self,
        key: &str,
        content_type: &str,
        ttl: Duration,
    ) -> StorageResult<String> {
        self.presign_put(key, content_type, ttl).await
    }

    fn public_url(&self, key: &str) -> String {
        public_url(&self.public_base_url, key)
    }

    /// Check connectivity to R2 by performing a head bucket operation.
    async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| sdk_error(e, &self.bucket, StorageError::AwsSdk))?;
        Ok(())
    }
}

/// Join the public base and an object key.
pub fn public_url(base: &str, key: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        key.trim_start_matches('/')
    )
}

/// Map an SDK failure, singling out permission errors so they surface as client errors.
fn sdk_error<E, R>(
    err: SdkError<E, R>,
    resource: &str,
    fallback: fn(String) -> StorageError,
) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let denied = err
        .code()
        .map(|code| ACCESS_DENIED_CODES.contains(&code))
        .unwrap_or(false);

    if denied {
        StorageError::access_denied(resource)
    } else {
        fallback(DisplayErrorContext(&err).to_string())
    }
}
