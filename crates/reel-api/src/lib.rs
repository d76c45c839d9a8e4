//! Axum HTTP gateway for the render orchestrator.
//!
//! This crate provides:
//! - Job creation, status polling and progress ingestion
//! - The worker completion callback and caller webhook relay
//! - An opt-in watchdog for renders that never call back
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use services::{JobService, Notifier, StaleJobDetector};
pub use state::AppState;
