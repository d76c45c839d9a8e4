//! In-memory object store.
//!
//! Grants are deterministic strings (`read://<key>?ttl=<secs>`), which makes
//! the store handy for tests and for running the gateway without R2.

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{StorageError, StorageResult};
use crate::store::ObjectStore;

/// Public base used by [`MemoryStore::with_keys`].
pub const MEMORY_PUBLIC_BASE: &str = "https://pub.test";

/// Object store backed by a key list.
#[derive(Debug, Default)]
pub struct MemoryStore {
    keys: RwLock<Vec<String>>,
    public_base: String,
    deny_reads: bool,
}

impl MemoryStore {
    /// Store holding `keys`, in that listing order.
    pub fn with_keys(keys: &[&str]) -> Self {
        Self {
            keys: RwLock::new(keys.iter().map(|k| k.to_string()).collect()),
            public_base: MEMORY_PUBLIC_BASE.to_string(),
            deny_reads: false,
        }
    }

    /// Refuse every read grant, as a credential without GET permission would.
    pub fn deny_reads(mut self) -> Self {
        self.deny_reads = true;
        self
    }

    /// Add a key at the end of the listing.
    pub fn insert(&self, key: impl Into<String>) {
        if let Ok(mut keys) = self.keys.write() {
            keys.push(key.into());
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_keys(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let keys = self
            .keys
            .read()
            .map_err(|_| StorageError::ListFailed("key list poisoned".to_string()))?;
        Ok(keys.iter().filter(|k| k.starts_with(prefix)).cloned().collect())
    }

    async fn grant_read(&self, key: &str, ttl: Duration) -> StorageResult<String> {
        if self.deny_reads {
            return Err(StorageError::access_denied(key));
        }
        Ok(format!("read://{}?ttl={}", key, ttl.as_secs()))
    }

    async fn grant_write(
        &self,
        key: &str,
        content_type: &str,
        ttl: Duration,
    ) -> StorageResult<String> {
        Ok(format!(
            "write://{}?type={}&ttl={}",
            key,
            content_type,
            ttl.as_secs()
        ))
    }

    fn public_url(&self, key: &str) -> String {
        crate::client::public_url(&self.public_base, key)
    }
}
