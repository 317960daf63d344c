//! Browser-style local storage backend.

use std::sync::Arc;

use async_trait::async_trait;
use sessionvault_core::{
    SessionValue, SettingsHandle, StorageKey, is_fragment_of, join_value, physical_key,
    split_value,
};
use sessionvault_storage::{
    BlockingSessionManager, ChangeNotifier, SessionManager, StorageError,
};

/// Host-supplied synchronous key-value store (`window.localStorage` and
/// friends). Operations cannot fail; a missing item is `None`.
pub trait LocalStore: Send + Sync {
    fn get_item(&self, name: &str) -> Option<String>;
    fn set_item(&self, name: &str, value: &str);
    fn remove_item(&self, name: &str);
    /// Names of every stored item, for prefix-scoped cleanup.
    fn keys(&self) -> Vec<String>;
}

/// Session manager over a synchronous local store, async-wrapped.
///
/// The store may be shared with unrelated host data, so destroy only
/// touches entries under the live key prefix.
pub struct LocalStorageManager {
    store: Arc<dyn LocalStore>,
    settings: SettingsHandle,
    notifier: ChangeNotifier,
}

impl LocalStorageManager {
    /// Creates a backend over the injected store.
    #[must_use]
    pub fn new(store: Arc<dyn LocalStore>, settings: SettingsHandle) -> Self {
        Self {
            store,
            settings,
            notifier: ChangeNotifier::new(),
        }
    }

    fn read(&self, key: &StorageKey) -> Option<String> {
        let settings = self.settings.current();
        join_value(|index| {
            self.store
                .get_item(&physical_key(&settings.key_prefix, key, index))
        })
    }

    fn write(&self, key: &StorageKey, value: &SessionValue) {
        let settings = self.settings.current();
        self.delete(key);
        match value {
            SessionValue::Text(text) => {
                for (index, fragment) in
                    split_value(text, settings.max_length).into_iter().enumerate()
                {
                    self.store
                        .set_item(&physical_key(&settings.key_prefix, key, index), &fragment);
                }
            }
            other => {
                self.store.set_item(
                    &physical_key(&settings.key_prefix, key, 0),
                    &other.serialize(),
                );
            }
        }
    }

    fn delete(&self, key: &StorageKey) {
        let settings = self.settings.current();
        for name in self.store.keys() {
            if is_fragment_of(&name, &settings.key_prefix, key) {
                self.store.remove_item(&name);
            }
        }
    }

    fn clear_prefixed(&self) {
        let prefix = self.settings.current().key_prefix.clone();
        for name in self.store.keys() {
            if name.starts_with(&prefix) {
                self.store.remove_item(&name);
            }
        }
    }
}

#[async_trait]
impl SessionManager for LocalStorageManager {
    async fn get_session_item(&self, key: &StorageKey) -> Result<Option<String>, StorageError> {
        Ok(self.read(key))
    }

    async fn set_session_item(
        &self,
        key: &StorageKey,
        value: SessionValue,
    ) -> Result<(), StorageError> {
        self.write(key, &value);
        self.notifier.notify();
        Ok(())
    }

    async fn remove_session_item(&self, key: &StorageKey) -> Result<(), StorageError> {
        self.delete(key);
        self.notifier.notify();
        Ok(())
    }

    async fn destroy_session(&self) -> Result<(), StorageError> {
        self.clear_prefixed();
        self.notifier.notify();
        Ok(())
    }

    fn async_store(&self) -> bool {
        false
    }

    fn as_blocking(&self) -> Option<&dyn BlockingSessionManager> {
        Some(self)
    }

    fn backend_name(&self) -> &'static str {
        "local-storage"
    }

    fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }
}

impl BlockingSessionManager for LocalStorageManager {
    fn get_session_item_blocking(
        &self,
        key: &StorageKey,
    ) -> Result<Option<String>, StorageError> {
        Ok(self.read(key))
    }

    fn set_session_item_blocking(
        &self,
        key: &StorageKey,
        value: SessionValue,
    ) -> Result<(), StorageError> {
        self.write(key, &value);
        self.notifier.notify();
        Ok(())
    }

    fn remove_session_item_blocking(&self, key: &StorageKey) -> Result<(), StorageError> {
        self.delete(key);
        self.notifier.notify();
        Ok(())
    }

    fn destroy_session_blocking(&self) -> Result<(), StorageError> {
        self.clear_prefixed();
        self.notifier.notify();
        Ok(())
    }
}

impl std::fmt::Debug for LocalStorageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStorageManager").finish_non_exhaustive()
    }
}
