//! Browser-extension storage backend.
//!
//! Extension storage areas are async and can genuinely fail (quota,
//! revoked permissions, detached contexts), and unlike the best-effort
//! cookie/KV backends there is no meaningful degraded mode: a failed read
//! here propagates.

use std::sync::Arc;

use async_trait::async_trait;
use sessionvault_core::{SessionValue, SettingsHandle, StorageKey, is_fragment_of, physical_key, split_value};
use sessionvault_storage::{AdapterError, ChangeNotifier, SessionManager, StorageError};

/// Host-supplied extension storage area.
#[async_trait]
pub trait ExtensionStore: Send + Sync {
    async fn get(&self, name: &str) -> Result<Option<String>, AdapterError>;
    async fn set(&self, name: &str, value: &str) -> Result<(), AdapterError>;
    async fn remove(&self, name: &str) -> Result<(), AdapterError>;
    /// Names of every stored item, for prefix-scoped cleanup.
    async fn keys(&self) -> Result<Vec<String>, AdapterError>;
}

/// Session manager over an extension storage area.
pub struct ExtensionStorageManager {
    store: Arc<dyn ExtensionStore>,
    settings: SettingsHandle,
    notifier: ChangeNotifier,
}

impl ExtensionStorageManager {
    /// Creates a backend over the injected storage area.
    #[must_use]
    pub fn new(store: Arc<dyn ExtensionStore>, settings: SettingsHandle) -> Self {
        Self {
            store,
            settings,
            notifier: ChangeNotifier::new(),
        }
    }

    async fn delete_fragments(&self, key: &StorageKey) -> Result<(), AdapterError> {
        let prefix = self.settings.current().key_prefix.clone();
        for name in self.store.keys().await? {
            if is_fragment_of(&name, &prefix, key) {
                self.store.remove(&name).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SessionManager for ExtensionStorageManager {
    async fn get_session_item(&self, key: &StorageKey) -> Result<Option<String>, StorageError> {
        let prefix = self.settings.current().key_prefix.clone();
        let mut joined = String::new();
        let mut index = 0;
        loop {
            let name = physical_key(&prefix, key, index);
            match self
                .store
                .get(&name)
                .await
                .map_err(|source| StorageError::read_failed("extension", source))?
            {
                Some(fragment) => {
                    joined.push_str(&fragment);
                    index += 1;
                }
                None => break,
            }
        }
        Ok(if index == 0 { None } else { Some(joined) })
    }

    async fn set_session_item(
        &self,
        key: &StorageKey,
        value: SessionValue,
    ) -> Result<(), StorageError> {
        self.delete_fragments(key)
            .await
            .map_err(|source| StorageError::write_failed("extension", source))?;

        let prefix = self.settings.current().key_prefix.clone();
        match &value {
            SessionValue::Text(text) => {
                let max_length = self.settings.current().max_length;
                for (index, fragment) in split_value(text, max_length).into_iter().enumerate() {
                    self.store
                        .set(&physical_key(&prefix, key, index), &fragment)
                        .await
                        .map_err(|source| StorageError::write_failed("extension", source))?;
                }
            }
            other => {
                self.store
                    .set(&physical_key(&prefix, key, 0), &other.serialize())
                    .await
                    .map_err(|source| StorageError::write_failed("extension", source))?;
            }
        }
        self.notifier.notify();
        Ok(())
    }

    async fn remove_session_item(&self, key: &StorageKey) -> Result<(), StorageError> {
        self.delete_fragments(key)
            .await
            .map_err(|source| StorageError::write_failed("extension", source))?;
        self.notifier.notify();
        Ok(())
    }

    async fn destroy_session(&self) -> Result<(), StorageError> {
        let prefix = self.settings.current().key_prefix.clone();
        let names = self
            .store
            .keys()
            .await
            .map_err(|source| StorageError::write_failed("extension", source))?;
        for name in names {
            if name.starts_with(&prefix) {
                self.store
                    .remove(&name)
                    .await
                    .map_err(|source| StorageError::write_failed("extension", source))?;
            }
        }
        self.notifier.notify();
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "extension-storage"
    }

    fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }
}

impl std::fmt::Debug for ExtensionStorageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionStorageManager")
            .finish_non_exhaustive()
    }
}
