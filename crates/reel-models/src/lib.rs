//! Shared data models for the reel render orchestrator.
//!
//! This crate provides Serde-serializable types for:
//! - Render jobs and their lifecycle state machine
//! - Progress history entries reported by the render worker
//! - Asset bundles (access-granted input URLs)
//! - Render parameters and the work order sent to remote compute

pub mod asset;
pub mod job;
pub mod render;

// Re-export common types
pub use asset::AssetBundle;
pub use job::{
    Job, JobId, JobStatus, ProgressEntry, Transition, TransitionError, TransitionOutcome,
};
pub use render::{
    OutputTarget, RenderParams, RenderParamsRequest, WorkOrder, DEFAULT_CODEC, DEFAULT_FPS,
    DEFAULT_RESOLUTION,
};
