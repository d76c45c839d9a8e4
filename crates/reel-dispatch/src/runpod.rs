//! RunPod serverless client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info, info_span, Instrument};

use reel_models::WorkOrder;

use crate::backend::{ComputeBackend, ExternalHandle};
use crate::error::{DispatchError, DispatchResult};

/// Default RunPod API base.
pub const DEFAULT_API_BASE: &str = "https://api.runpod.ai";

/// RunPod client configuration.
#[derive(Debug, Clone)]
pub struct RunPodConfig {
    /// API key (sent as a bearer token)
    pub api_key: String,
    /// Serverless endpoint ID
    pub endpoint_id: String,
    /// API base URL
    pub api_base: String,
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
}

impl RunPodConfig {
    /// Create config from environment variables.
    ///
    /// `RUNPOD_API_KEY` and `RUNPOD_ENDPOINT_ID` are required.
    pub fn from_env() -> DispatchResult<Self> {
        let api_key = std::env::var("RUNPOD_API_KEY")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| DispatchError::config("RUNPOD_API_KEY not set"))?;
        let endpoint_id = std::env::var("RUNPOD_ENDPOINT_ID")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| DispatchError::config("RUNPOD_ENDPOINT_ID not set"))?;

        Ok(Self {
            api_key,
            endpoint_id,
            api_base: std::env::var("RUNPOD_API_BASE")
                .unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            timeout: Duration::from_secs(
                std::env::var("RUNPOD_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            connect_timeout: Duration::from_secs(5),
        })
    }

    /// `POST` target for asynchronous runs.
    pub fn run_url(&self) -> String {
        format!(
            "{}/v2/{}/run",
            self.api_base.trim_end_matches('/'),
            self.endpoint_id
        )
    }
}

#[derive(Serialize)]
struct RunRequest<'a> {
    input: &'a WorkOrder,
}

/// RunPod serverless API client.
#[derive(Clone)]
pub struct RunPodClient {
    http: Client,
    config: RunPodConfig,
}

impl RunPodClient {
    pub fn new(config: RunPodConfig) -> DispatchResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("reel-dispatch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> DispatchResult<Self> {
        Self::new(RunPodConfig::from_env()?)
    }

    pub fn endpoint_id(&self) -> &str {
        &self.config.endpoint_id
    }
}

#[async_trait]
impl ComputeBackend for RunPodClient {
    async fn submit(&self, order: &WorkOrder) -> DispatchResult<ExternalHandle> {
        let url = self.config.run_url();
        let span = info_span!(
            "runpod_submit",
            job_id = %order.job_id,
            endpoint = %self.config.endpoint_id
        );

        async {
            debug!("Submitting work order to {}", url);

            let response = self
                .http
                .post(&url)
                .bearer_auth(&self.config.api_key)
                .json(&RunRequest { input: order })
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(DispatchError::rejected(status.as_u16(), body));
            }

            let handle: ExternalHandle = response
                .json()
                .await
                .map_err(|e| DispatchError::InvalidResponse(e.to_string()))?;

            if handle.id.is_empty() {
                return Err(DispatchError::InvalidResponse(
                    "response carried an empty job id".to_string(),
                ));
            }

            info!(runpod_id = %handle.id, status = ?handle.status, "Work order accepted");
            Ok(handle)
        }
        .instrument(span)
        .await
    }
}
