//! Render job registry.
//!
//! This crate provides:
//! - The `JobStore` key-value abstraction over job records
//! - An in-memory store with per-job serialized mutations
//! - `JobRegistry`, the lifecycle API the gateway talks to

pub mod error;
pub mod memory;
pub mod registry;
pub mod store;

pub use error::{RegistryError, RegistryResult};
pub use memory::InMemoryJobStore;
pub use registry::{JobRegistry, TransitionResult};
pub use store::{apply_mutation, JobMutation, JobStore, MutationOutcome, Mutated};
