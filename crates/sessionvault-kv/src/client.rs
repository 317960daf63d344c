//! The host-injected key-value client seam.

use std::time::Duration;

use async_trait::async_trait;
use sessionvault_storage::AdapterError;

/// Host-supplied client for an external key-value service.
#[async_trait]
pub trait KvClient: Send + Sync {
    /// Reads one entry. Missing entries are `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<String>, AdapterError>;

    /// Writes one entry, optionally with a time-to-live.
    async fn put(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), AdapterError>;

    /// Deletes one entry. Deleting an absent entry is not an error.
    async fn delete(&self, key: &str) -> Result<(), AdapterError>;

    /// Lists entry names starting with `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, AdapterError>;
}
