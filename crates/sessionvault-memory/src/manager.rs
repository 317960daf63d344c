//! In-process session storage over a concurrent map.

use async_trait::async_trait;
use dashmap::DashMap;
use sessionvault_core::{
    SessionValue, SettingsHandle, StorageKey, is_fragment_of, join_value, physical_key,
    split_value,
};
use sessionvault_storage::{
    BlockingSessionManager, ChangeNotifier, SessionManager, StorageError,
};

/// In-process memory backend.
///
/// Fragments are stored under their physical slot names in a
/// [`DashMap`], so the on-map layout is identical to every other backend
/// and live `key_prefix` changes behave the same way. `destroy_session`
/// drops the whole map contents, prefix changes included.
#[derive(Debug)]
pub struct MemorySessionManager {
    entries: DashMap<String, String>,
    settings: SettingsHandle,
    notifier: ChangeNotifier,
}

impl MemorySessionManager {
    /// Creates an empty memory backend reading `settings` live.
    #[must_use]
    pub fn new(settings: SettingsHandle) -> Self {
        Self {
            entries: DashMap::new(),
            settings,
            notifier: ChangeNotifier::new(),
        }
    }

    /// Number of physical slots currently held. Test and debugging aid.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if a physical slot with this exact name exists.
    #[must_use]
    pub fn has_slot(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    fn read(&self, key: &StorageKey) -> Option<String> {
        let settings = self.settings.current();
        join_value(|index| {
            self.entries
                .get(&physical_key(&settings.key_prefix, key, index))
                .map(|entry| entry.value().clone())
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
                    self.entries
                        .insert(physical_key(&settings.key_prefix, key, index), fragment);
                }
            }
            other => {
                // Non-text values are serialized once into slot 0, never
                // split.
                self.entries
                    .insert(physical_key(&settings.key_prefix, key, 0), other.serialize());
            }
        }
    }

    fn delete(&self, key: &StorageKey) {
        // Enumeration-based cleanup also collects orphaned fragments left
        // after a gap.
        let settings = self.settings.current();
        self.entries
            .retain(|name, _| !is_fragment_of(name, &settings.key_prefix, key));
    }
}

#[async_trait]
impl SessionManager for MemorySessionManager {
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
        self.entries.clear();
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
        "memory"
    }

    fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }
}

impl BlockingSessionManager for MemorySessionManager {
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
        self.entries.clear();
        self.notifier.notify();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sessionvault_core::SessionSettings;
    use sessionvault_storage::blocking_get;
    use serde_json::json;

    fn manager() -> MemorySessionManager {
        MemorySessionManager::new(SettingsHandle::new())
    }

    fn manager_with(settings: SessionSettings) -> MemorySessionManager {
        MemorySessionManager::new(SettingsHandle::with_settings(settings))
    }

    #[tokio::test]
    async fn test_set_get_round_trip() {
        let manager = manager();
        manager
            .set_session_item(&StorageKey::AccessToken, "tok-abc".into())
            .await
            .unwrap();
        assert_eq!(
            manager
                .get_session_item(&StorageKey::AccessToken)
                .await
                .unwrap()
                .as_deref(),
            Some("tok-abc")
        );
    }

    #[tokio::test]
    async fn test_missing_key_reads_as_none() {
        let manager = manager();
        assert!(
            manager
                .get_session_item(&StorageKey::Nonce)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_chunked_value_uses_expected_slots() {
        let mut settings = SessionSettings::default();
        settings.max_length = 10;
        let manager = manager_with(settings);

        manager
            .set_session_item(&StorageKey::State, "0123456789abcdefghij".into())
            .await
            .unwrap();

        assert_eq!(manager.slot_count(), 2);
        assert!(manager.has_slot("kinde-state0"));
        assert!(manager.has_slot("kinde-state1"));
        assert_eq!(
            manager
                .get_session_item(&StorageKey::State)
                .await
                .unwrap()
                .as_deref(),
            Some("0123456789abcdefghij")
        );

        manager
            .remove_session_item(&StorageKey::State)
            .await
            .unwrap();
        assert_eq!(manager.slot_count(), 0);
        assert!(
            manager
                .get_session_item(&StorageKey::State)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_overwrite_drops_stale_trailing_fragments() {
        let mut settings = SessionSettings::default();
        settings.max_length = 4;
        let manager = manager_with(settings);

        manager
            .set_session_item(&StorageKey::State, "aaaabbbbcccc".into())
            .await
            .unwrap();
        assert_eq!(manager.slot_count(), 3);

        manager
            .set_session_item(&StorageKey::State, "dddd".into())
            .await
            .unwrap();
        assert_eq!(manager.slot_count(), 1);
        assert_eq!(
            manager
                .get_session_item(&StorageKey::State)
                .await
                .unwrap()
                .as_deref(),
            Some("dddd")
        );
    }

    #[tokio::test]
    async fn test_remove_absent_key_is_noop() {
        let manager = manager();
        manager
            .remove_session_item(&StorageKey::RefreshToken)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_destroy_clears_everything() {
        let manager = manager();
        manager
            .set_session_item(&StorageKey::AccessToken, "a".into())
            .await
            .unwrap();
        manager
            .set_session_item(&StorageKey::IdToken, "b".into())
            .await
            .unwrap();

        manager.destroy_session().await.unwrap();

        assert!(
            manager
                .get_session_item(&StorageKey::AccessToken)
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            manager
                .get_session_item(&StorageKey::IdToken)
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(manager.slot_count(), 0);
    }

    #[tokio::test]
    async fn test_non_text_values_occupy_slot_zero_only() {
        let mut settings = SessionSettings::default();
        settings.max_length = 4;
        let manager = manager_with(settings);

        manager
            .set_session_item(
                &StorageKey::Custom("flags".to_string()),
                SessionValue::Json(json!({"beta": true, "theme": "dark"})),
            )
            .await
            .unwrap();

        assert_eq!(manager.slot_count(), 1);
        assert!(manager.has_slot("kinde-flags0"));
        let raw = manager
            .get_session_item(&StorageKey::Custom("flags".to_string()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&raw).unwrap(),
            json!({"beta": true, "theme": "dark"})
        );
    }

    #[tokio::test]
    async fn test_live_prefix_change_affects_next_call() {
        let handle = SettingsHandle::new();
        let manager = MemorySessionManager::new(handle.clone());

        manager
            .set_session_item(&StorageKey::AccessToken, "tok".into())
            .await
            .unwrap();
        handle.update(|s| s.key_prefix = "acme-".to_string());

        // Entries written under the old prefix are no longer visible.
        assert!(
            manager
                .get_session_item(&StorageKey::AccessToken)
                .await
                .unwrap()
                .is_none()
        );
        assert!(manager.has_slot("kinde-accessToken0"));
    }

    #[tokio::test]
    async fn test_blocking_facade_is_available() {
        let manager = manager();
        assert!(!manager.async_store());
        manager
            .set_session_item(&StorageKey::State, "s".into())
            .await
            .unwrap();
        assert_eq!(
            blocking_get(&manager, &StorageKey::State)
                .unwrap()
                .as_deref(),
            Some("s")
        );
    }

    #[tokio::test]
    async fn test_batch_helpers() {
        let manager = manager();
        manager
            .set_items(vec![
                (StorageKey::AccessToken, "a".into()),
                (StorageKey::IdToken, "b".into()),
            ])
            .await
            .unwrap();

        let items = manager
            .get_items(&[StorageKey::AccessToken, StorageKey::IdToken, StorageKey::Nonce])
            .await
            .unwrap();
        assert_eq!(items[&StorageKey::AccessToken].as_deref(), Some("a"));
        assert_eq!(items[&StorageKey::IdToken].as_deref(), Some("b"));
        assert_eq!(items[&StorageKey::Nonce], None);

        manager
            .remove_items(&[StorageKey::AccessToken, StorageKey::IdToken])
            .await
            .unwrap();
        assert_eq!(manager.slot_count(), 0);
    }
}
