//! Object store abstraction used by the asset locator and the gateway.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StorageResult;

/// Default validity of read grants for render inputs (1 hour).
pub const READ_GRANT_TTL: Duration = Duration::from_secs(3600);

/// Default validity of the output write grant (2 hours, renders can be slow).
pub const WRITE_GRANT_TTL: Duration = Duration::from_secs(7200);

/// Content type of rendered output.
pub const OUTPUT_CONTENT_TYPE: &str = "video/mp4";

/// Prefix listing plus capability-scoped URL issuance.
///
/// The remote worker has no storage credentials; everything it touches is
/// reached through URLs minted here.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List every key under `prefix`, in listing order.
    async fn list_keys(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Time-bounded URL permitting GET of `key`.
    async fn grant_read(&self, key: &str, ttl: Duration) -> StorageResult<String>;

    /// Time-bounded URL permitting PUT of `key` with the given content type.
    async fn grant_write(&self, key: &str, content_type: &str, ttl: Duration)
        -> StorageResult<String>;

    /// Stable public URL for `key`. Pure string computation, valid before the object exists.
    fn public_url(&self, key: &str) -> String;

    /// Cheap reachability probe for readiness checks.
    async fn check_connectivity(&self) -> StorageResult<()> {
        Ok(())
    }
}
