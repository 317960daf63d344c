//! The session manager contract implemented by every backend.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::try_join_all;
use sessionvault_core::{SessionValue, StorageKey};

use crate::blocking::BlockingSessionManager;
use crate::error::StorageError;
use crate::notifier::{ChangeNotifier, SessionListener, Subscription};

/// The contract every storage backend implements.
///
/// Backends differ in physical store, fragment cap and failure policy, but
/// share these semantics:
///
/// - a missing key reads as `Ok(None)`, never an error
/// - `set_session_item` first removes any pre-existing fragments for the
///   key, then writes the new ones, so no stale trailing fragment survives
/// - `remove_session_item` is idempotent
/// - `destroy_session` clears every key the backend is aware of
/// - every successful mutation schedules a coalesced listener notification
///
/// There is no cross-key atomicity and no per-key locking: concurrent
/// writes to one key race, and callers needing ordering must serialize
/// themselves.
///
/// # Example
///
/// ```ignore
/// use sessionvault_storage::{DynSessionManager, StorageError};
/// use sessionvault_core::StorageKey;
///
/// async fn read_access_token(
///     manager: &DynSessionManager,
/// ) -> Result<Option<String>, StorageError> {
///     manager.get_session_item(&StorageKey::AccessToken).await
/// }
/// ```
#[async_trait]
pub trait SessionManager: Send + Sync {
    // ==================== Primitives ====================

    /// Reads the full value stored under `key`.
    ///
    /// Returns `Ok(None)` if the key is absent. Best-effort backends also
    /// degrade transient read failures to `Ok(None)`.
    async fn get_session_item(&self, key: &StorageKey) -> Result<Option<String>, StorageError>;

    /// Stores `value` under `key`, replacing anything previously stored.
    ///
    /// Text values are chunked to the backend's fragment cap; other value
    /// variants are serialized once into slot 0.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::WriteFailed` if the physical store rejects a
    /// write or the preceding cleanup delete.
    async fn set_session_item(
        &self,
        key: &StorageKey,
        value: SessionValue,
    ) -> Result<(), StorageError>;

    /// Removes the value stored under `key`. Removing an absent key is a
    /// no-op.
    async fn remove_session_item(&self, key: &StorageKey) -> Result<(), StorageError>;

    /// Clears every key this backend is aware of.
    async fn destroy_session(&self) -> Result<(), StorageError>;

    // ==================== Metadata ====================

    /// Returns `true` if this backend has no synchronous access path.
    fn async_store(&self) -> bool {
        true
    }

    /// Returns the synchronous facade, for backends that have one.
    fn as_blocking(&self) -> Option<&dyn BlockingSessionManager> {
        None
    }

    /// Returns the name of this backend for logging/debugging.
    fn backend_name(&self) -> &'static str;

    /// Returns this manager's listener hub.
    fn notifier(&self) -> &ChangeNotifier;

    // ==================== Batch helpers ====================

    /// Stores several items, dispatched in parallel.
    ///
    /// No cross-key atomicity: a failure may leave some items written.
    async fn set_items(
        &self,
        items: Vec<(StorageKey, SessionValue)>,
    ) -> Result<(), StorageError> {
        try_join_all(
            items
                .into_iter()
                .map(|(key, value)| async move { self.set_session_item(&key, value).await }),
        )
        .await?;
        Ok(())
    }

    /// Reads several keys, dispatched in parallel.
    async fn get_items(
        &self,
        keys: &[StorageKey],
    ) -> Result<HashMap<StorageKey, Option<String>>, StorageError> {
        let values = try_join_all(keys.iter().map(|key| self.get_session_item(key))).await?;
        Ok(keys.iter().cloned().zip(values).collect())
    }

    /// Removes several keys, dispatched in parallel.
    async fn remove_items(&self, keys: &[StorageKey]) -> Result<(), StorageError> {
        try_join_all(keys.iter().map(|key| self.remove_session_item(key))).await?;
        Ok(())
    }

    // ==================== Listeners ====================

    /// Subscribes a listener to this manager's coalesced change
    /// notifications.
    fn subscribe(&self, listener: Arc<dyn SessionListener>) -> Subscription {
        self.notifier().subscribe(listener)
    }
}

/// Type alias for a shared session manager trait object.
pub type DynSessionManager = Arc<dyn SessionManager>;
