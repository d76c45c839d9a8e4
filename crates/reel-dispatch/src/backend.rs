//! Remote compute abstraction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use reel_models::WorkOrder;

use crate::error::DispatchResult;

/// Handle the compute service assigned to an accepted work order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalHandle {
    pub id: String,
    /// Queue status reported at submission time (e.g. `IN_QUEUE`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// A service that accepts work orders and reports back through the order's callback URLs.
///
/// Submission is fire-and-forget: once accepted, nothing is polled.
#[async_trait]
pub trait ComputeBackend: Send + Sync {
    async fn submit(&self, order: &WorkOrder) -> DispatchResult<ExternalHandle>;
}
