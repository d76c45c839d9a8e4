//! Cloudflare R2 storage access for the render orchestrator.
//!
//! This crate provides:
//! - Object listing and presigned read/write URLs (access grants)
//! - Stable public URLs for rendered output
//! - Channel asset discovery and classification
//! - An in-memory store for tests and local runs

pub mod channel;
pub mod client;
pub mod error;
pub mod memory;
pub mod store;

pub use channel::{AssetLocator, ChannelLayout, PreparedOutput};
pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use store::{ObjectStore, OUTPUT_CONTENT_TYPE, READ_GRANT_TTL, WRITE_GRANT_TTL};
