//! Synchronous facade for backends with a direct access path.
//!
//! Async-only backends have no blocking facade; using a blocking helper
//! against one fails with [`StorageError::AsyncOnly`] instead of silently
//! returning stale data.

use sessionvault_core::{SessionValue, StorageKey};

use crate::error::StorageError;
use crate::manager::SessionManager;

/// Synchronous counterpart of the [`SessionManager`] primitives.
///
/// Implemented only by backends whose physical store is directly
/// addressable without awaiting (in-process memory, host request
/// sessions, browser-style local storage).
pub trait BlockingSessionManager: Send + Sync {
    fn get_session_item_blocking(
        &self,
        key: &StorageKey,
    ) -> Result<Option<String>, StorageError>;

    fn set_session_item_blocking(
        &self,
        key: &StorageKey,
        value: SessionValue,
    ) -> Result<(), StorageError>;

    fn remove_session_item_blocking(&self, key: &StorageKey) -> Result<(), StorageError>;

    fn destroy_session_blocking(&self) -> Result<(), StorageError>;
}

/// Reads `key` through the blocking facade.
///
/// # Errors
///
/// Returns [`StorageError::AsyncOnly`] if the backend has no sync path.
pub fn blocking_get(
    manager: &dyn SessionManager,
    key: &StorageKey,
) -> Result<Option<String>, StorageError> {
    manager
        .as_blocking()
        .ok_or(StorageError::AsyncOnly)?
        .get_session_item_blocking(key)
}

/// Writes `key` through the blocking facade.
///
/// # Errors
///
/// Returns [`StorageError::AsyncOnly`] if the backend has no sync path.
pub fn blocking_set(
    manager: &dyn SessionManager,
    key: &StorageKey,
    value: SessionValue,
) -> Result<(), StorageError> {
    manager
        .as_blocking()
        .ok_or(StorageError::AsyncOnly)?
        .set_session_item_blocking(key, value)
}

/// Removes `key` through the blocking facade.
///
/// # Errors
///
/// Returns [`StorageError::AsyncOnly`] if the backend has no sync path.
pub fn blocking_remove(
    manager: &dyn SessionManager,
    key: &StorageKey,
) -> Result<(), StorageError> {
    manager
        .as_blocking()
        .ok_or(StorageError::AsyncOnly)?
        .remove_session_item_blocking(key)
}

/// Destroys the session through the blocking facade.
///
/// # Errors
///
/// Returns [`StorageError::AsyncOnly`] if the backend has no sync path.
pub fn blocking_destroy(manager: &dyn SessionManager) -> Result<(), StorageError> {
    manager
        .as_blocking()
        .ok_or(StorageError::AsyncOnly)?
        .destroy_session_blocking()
}
