//! Remote compute submission.
//!
//! This crate provides:
//! - The `ComputeBackend` seam the orchestrator dispatches through
//! - A RunPod serverless client (`POST /v2/{endpoint}/run`)

pub mod backend;
pub mod error;
pub mod runpod;

pub use backend::{ComputeBackend, ExternalHandle};
pub use error::{DispatchError, DispatchResult};
pub use runpod::{RunPodClient, RunPodConfig};
