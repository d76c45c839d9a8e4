//! Application state.

use std::sync::Arc;

use reel_dispatch::{ComputeBackend, RunPodClient};
use reel_registry::JobRegistry;
use reel_storage::{AssetLocator, ChannelLayout, ObjectStore, R2Client};

use crate::config::ApiConfig;
use crate::services::{JobService, Notifier};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub storage: Arc<dyn ObjectStore>,
    pub jobs: JobService,
}

impl AppState {
    /// Wire the gateway over explicit collaborators.
    pub fn new(
        config: ApiConfig,
        storage: Arc<dyn ObjectStore>,
        layout: ChannelLayout,
        registry: JobRegistry,
        compute: Arc<dyn ComputeBackend>,
    ) -> anyhow::Result<Self> {
        let notifier = Notifier::new(config.notify_timeout)?;
        let locator = AssetLocator::new(Arc::clone(&storage), layout);
        let jobs = JobService::new(config.clone(), locator, registry, compute, notifier);

        Ok(Self {
            config,
            storage,
            jobs,
        })
    }

    /// Create state backed by R2, RunPod and the in-memory registry.
    pub fn from_env(config: ApiConfig) -> anyhow::Result<Self> {
        let storage = R2Client::from_env()?;
        let compute = RunPodClient::from_env()?;

        Self::new(
            config,
            Arc::new(storage),
            ChannelLayout::from_env(),
            JobRegistry::in_memory(),
            Arc::new(compute),
        )
    }
}
