//! Platform secure-enclave backend.
//!
//! Keychain-style stores initialize after the process starts, so the
//! capability is attached to an already-constructed manager. Enclave
//! entries are size-limited on several platforms, hence the tight
//! fragment cap on top of the configured maximum.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sessionvault_core::{SessionValue, SettingsHandle, StorageKey, physical_key, split_value};
use sessionvault_storage::{AdapterError, ChangeNotifier, SessionManager, StorageError};

/// Hard upper bound on a single enclave entry, in characters.
pub const SECURE_MAX_LENGTH: usize = 2048;

/// Host-supplied secure storage capability.
#[async_trait]
pub trait SecureStore: Send + Sync {
    async fn get(&self, name: &str) -> Result<Option<String>, AdapterError>;
    async fn set(&self, name: &str, value: &str) -> Result<(), AdapterError>;
    async fn delete(&self, name: &str) -> Result<(), AdapterError>;
}

/// Session manager over a platform secure store.
///
/// Only [`SessionValue::Text`] is accepted; structured values do not
/// belong in an enclave and are rejected with `InvalidValue`.
pub struct SecureStorageManager {
    store: Mutex<Option<Arc<dyn SecureStore>>>,
    settings: SettingsHandle,
    notifier: ChangeNotifier,
}

impl SecureStorageManager {
    /// Creates a manager with no capability yet. Call
    /// [`attach`](Self::attach) once the platform store is ready.
    #[must_use]
    pub fn new(settings: SettingsHandle) -> Self {
        Self {
            store: Mutex::new(None),
            settings,
            notifier: ChangeNotifier::new(),
        }
    }

    /// Attaches the secure store capability, replacing any previous one.
    pub fn attach(&self, store: Arc<dyn SecureStore>) {
        tracing::debug!("secure store capability attached");
        match self.store.lock() {
            Ok(mut slot) => *slot = Some(store),
            Err(mut poisoned) => **poisoned.get_mut() = Some(store),
        }
    }

    /// Returns `true` once a capability has been attached.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.store.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }

    fn store(&self) -> Result<Arc<dyn SecureStore>, StorageError> {
        self.store
            .lock()
            .map_err(|_| StorageError::unavailable("secure store lock poisoned"))?
            .clone()
            .ok_or_else(|| StorageError::unavailable("secure store not ready"))
    }

    fn fragment_cap(&self) -> usize {
        self.settings.current().max_length.min(SECURE_MAX_LENGTH)
    }

    async fn delete_run(
        &self,
        store: &Arc<dyn SecureStore>,
        prefix: &str,
        key: &StorageKey,
    ) -> Result<(), AdapterError> {
        // No enumeration on enclave stores; walk the contiguous run.
        let mut index = 0;
        loop {
            let name = physical_key(prefix, key, index);
            if store.get(&name).await?.is_none() {
                return Ok(());
            }
            store.delete(&name).await?;
            index += 1;
        }
    }
}

#[async_trait]
impl SessionManager for SecureStorageManager {
    async fn get_session_item(&self, key: &StorageKey) -> Result<Option<String>, StorageError> {
        let store = self.store()?;
        let prefix = self.settings.current().key_prefix.clone();

        let mut joined = String::new();
        let mut index = 0;
        loop {
            let name = physical_key(&prefix, key, index);
            match store
                .get(&name)
                .await
                .map_err(|source| StorageError::read_failed("secure", source))?
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
        let SessionValue::Text(text) = value else {
            return Err(StorageError::invalid_value(
                "secure storage accepts string values only",
            ));
        };
        let store = self.store()?;
        let prefix = self.settings.current().key_prefix.clone();

        self.delete_run(&store, &prefix, key)
            .await
            .map_err(|source| StorageError::write_failed("secure", source))?;
        for (index, fragment) in split_value(&text, self.fragment_cap()).into_iter().enumerate() {
            store
                .set(&physical_key(&prefix, key, index), &fragment)
                .await
                .map_err(|source| StorageError::write_failed("secure", source))?;
        }
        self.notifier.notify();
        Ok(())
    }

    async fn remove_session_item(&self, key: &StorageKey) -> Result<(), StorageError> {
        let store = self.store()?;
        let prefix = self.settings.current().key_prefix.clone();
        self.delete_run(&store, &prefix, key)
            .await
            .map_err(|source| StorageError::write_failed("secure", source))?;
        self.notifier.notify();
        Ok(())
    }

    async fn destroy_session(&self) -> Result<(), StorageError> {
        let store = self.store()?;
        let prefix = self.settings.current().key_prefix.clone();
        for key in &StorageKey::WELL_KNOWN {
            self.delete_run(&store, &prefix, key)
                .await
                .map_err(|source| StorageError::write_failed("secure", source))?;
        }
        self.notifier.notify();
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "secure-storage"
    }

    fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }
}

impl std::fmt::Debug for SecureStorageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureStorageManager")
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sessionvault_core::SessionSettings;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MockEnclave(Mutex<HashMap<String, String>>);

    #[async_trait]
    impl SecureStore for MockEnclave {
        async fn get(&self, name: &str) -> Result<Option<String>, AdapterError> {
            Ok(self.0.lock().unwrap().get(name).cloned())
        }

        async fn set(&self, name: &str, value: &str) -> Result<(), AdapterError> {
            self.0
                .lock()
                .unwrap()
                .insert(name.to_string(), value.to_string());
            Ok(())
        }

        async fn delete(&self, name: &str) -> Result<(), AdapterError> {
            self.0.lock().unwrap().remove(name);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_not_ready_before_attach() {
        let manager = SecureStorageManager::new(SettingsHandle::new());
        assert!(!manager.is_ready());

        let error = manager
            .get_session_item(&StorageKey::RefreshToken)
            .await
            .unwrap_err();
        assert!(error.is_unavailable());

        manager.attach(Arc::new(MockEnclave::default()));
        assert!(manager.is_ready());
        assert!(
            manager
                .get_session_item(&StorageKey::RefreshToken)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_rejects_non_text_values() {
        let manager = SecureStorageManager::new(SettingsHandle::new());
        manager.attach(Arc::new(MockEnclave::default()));

        let error = manager
            .set_session_item(&StorageKey::RefreshToken, SessionValue::Bool(true))
            .await
            .unwrap_err();
        assert!(matches!(error, StorageError::InvalidValue { .. }));
    }

    #[tokio::test]
    async fn test_fragment_cap_overrides_large_settings() {
        let settings = SettingsHandle::with_settings(SessionSettings {
            max_length: 10_000,
            ..SessionSettings::default()
        });
        let enclave = Arc::new(MockEnclave::default());
        let manager = SecureStorageManager::new(settings);
        manager.attach(enclave.clone());

        let long = "r".repeat(SECURE_MAX_LENGTH + 1);
        manager
            .set_session_item(&StorageKey::RefreshToken, long.as_str().into())
            .await
            .unwrap();

        let items = enclave.0.lock().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(
            items
                .get("kinde-refreshToken0")
                .map(|fragment| fragment.chars().count()),
            Some(SECURE_MAX_LENGTH)
        );
        drop(items);

        assert_eq!(
            manager
                .get_session_item(&StorageKey::RefreshToken)
                .await
                .unwrap(),
            Some(long)
        );
    }

    #[tokio::test]
    async fn test_destroy_clears_well_known_keys() {
        let manager = SecureStorageManager::new(SettingsHandle::new());
        let enclave = Arc::new(MockEnclave::default());
        manager.attach(enclave.clone());

        manager
            .set_session_item(&StorageKey::AccessToken, "a".into())
            .await
            .unwrap();
        manager
            .set_session_item(&StorageKey::RefreshToken, "r".into())
            .await
            .unwrap();
        manager.destroy_session().await.unwrap();

        assert!(enclave.0.lock().unwrap().is_empty());
    }
}
