//! Per-request session object backend.
//!
//! Server frameworks hand each request a mutable session map; middleware
//! binds it here before handlers run and unbinds it afterwards. Ops
//! against an unbound manager surface `Unavailable` rather than panic.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sessionvault_core::{
    SessionValue, SettingsHandle, StorageKey, is_fragment_of, physical_key, split_value,
};
use sessionvault_storage::{BlockingSessionManager, ChangeNotifier, SessionManager, StorageError};

/// Host-supplied mutable session map for the current request.
pub trait SessionObject: Send + Sync {
    fn get(&self, name: &str) -> Option<String>;
    fn insert(&self, name: &str, value: &str);
    fn remove(&self, name: &str);
    /// Names of every stored item, for prefix-scoped cleanup.
    fn keys(&self) -> Vec<String>;
}

/// Session manager over a framework request session.
pub struct RequestSessionManager {
    session: Mutex<Option<Arc<dyn SessionObject>>>,
    settings: SettingsHandle,
    notifier: ChangeNotifier,
}

impl RequestSessionManager {
    /// Creates an unbound manager. Call [`bind`](Self::bind) with the
    /// request's session object before use.
    #[must_use]
    pub fn new(settings: SettingsHandle) -> Self {
        Self {
            session: Mutex::new(None),
            settings,
            notifier: ChangeNotifier::new(),
        }
    }

    /// Creates a manager already bound to a session object.
    #[must_use]
    pub fn bound(session: Arc<dyn SessionObject>, settings: SettingsHandle) -> Self {
        let manager = Self::new(settings);
        manager.bind(session);
        manager
    }

    /// Binds the current request's session object, replacing any
    /// previous binding.
    pub fn bind(&self, session: Arc<dyn SessionObject>) {
        tracing::debug!("binding request session object");
        match self.session.lock() {
            Ok(mut slot) => *slot = Some(session),
            Err(mut poisoned) => **poisoned.get_mut() = Some(session),
        }
    }

    /// Drops the current binding, typically at end of request.
    pub fn unbind(&self) {
        tracing::debug!("unbinding request session object");
        match self.session.lock() {
            Ok(mut slot) => *slot = None,
            Err(mut poisoned) => **poisoned.get_mut() = None,
        }
    }

    fn session(&self) -> Result<Arc<dyn SessionObject>, StorageError> {
        self.session
            .lock()
            .map_err(|_| StorageError::unavailable("request session lock poisoned"))?
            .clone()
            .ok_or_else(|| StorageError::unavailable("no session object bound to the request"))
    }

    fn read(&self, key: &StorageKey) -> Result<Option<String>, StorageError> {
        let session = self.session()?;
        let prefix = self.settings.current().key_prefix.clone();

        let Some(first) = session.get(&physical_key(&prefix, key, 0)) else {
            return Ok(None);
        };
        // Single fragment is the overwhelmingly common case for a
        // per-request map; skip the concatenation loop.
        if session.get(&physical_key(&prefix, key, 1)).is_none() {
            return Ok(Some(first));
        }

        let mut joined = first;
        let mut index = 1;
        while let Some(fragment) = session.get(&physical_key(&prefix, key, index)) {
            joined.push_str(&fragment);
            index += 1;
        }
        Ok(Some(joined))
    }

    fn write(&self, key: &StorageKey, value: &SessionValue) -> Result<(), StorageError> {
        let session = self.session()?;
        let settings = self.settings.current();
        Self::delete_fragments(&*session, &settings.key_prefix, key);
        match value {
            SessionValue::Text(text) => {
                for (index, fragment) in
                    split_value(text, settings.max_length).into_iter().enumerate()
                {
                    session.insert(&physical_key(&settings.key_prefix, key, index), &fragment);
                }
            }
            other => {
                session.insert(
                    &physical_key(&settings.key_prefix, key, 0),
                    &other.serialize(),
                );
            }
        }
        Ok(())
    }

    fn delete(&self, key: &StorageKey) -> Result<(), StorageError> {
        let session = self.session()?;
        let prefix = self.settings.current().key_prefix.clone();
        Self::delete_fragments(&*session, &prefix, key);
        Ok(())
    }

    fn delete_fragments(session: &dyn SessionObject, prefix: &str, key: &StorageKey) {
        for name in session.keys() {
            if is_fragment_of(&name, prefix, key) {
                session.remove(&name);
            }
        }
    }

    fn clear_prefixed(&self) -> Result<(), StorageError> {
        let session = self.session()?;
        let prefix = self.settings.current().key_prefix.clone();
        for name in session.keys() {
            if name.starts_with(&prefix) {
                session.remove(&name);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SessionManager for RequestSessionManager {
    async fn get_session_item(&self, key: &StorageKey) -> Result<Option<String>, StorageError> {
        self.read(key)
    }

    async fn set_session_item(
        &self,
        key: &StorageKey,
        value: SessionValue,
    ) -> Result<(), StorageError> {
        self.write(key, &value)?;
        self.notifier.notify();
        Ok(())
    }

    async fn remove_session_item(&self, key: &StorageKey) -> Result<(), StorageError> {
        self.delete(key)?;
        self.notifier.notify();
        Ok(())
    }

    async fn destroy_session(&self) -> Result<(), StorageError> {
        self.clear_prefixed()?;
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
        "request-session"
    }

    fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }
}

impl BlockingSessionManager for RequestSessionManager {
    fn get_session_item_blocking(
        &self,
        key: &StorageKey,
    ) -> Result<Option<String>, StorageError> {
        self.read(key)
    }

    fn set_session_item_blocking(
        &self,
        key: &StorageKey,
        value: SessionValue,
    ) -> Result<(), StorageError> {
        self.write(key, &value)?;
        self.notifier.notify();
        Ok(())
    }

    fn remove_session_item_blocking(&self, key: &StorageKey) -> Result<(), StorageError> {
        self.delete(key)?;
        self.notifier.notify();
        Ok(())
    }

    fn destroy_session_blocking(&self) -> Result<(), StorageError> {
        self.clear_prefixed()?;
        self.notifier.notify();
        Ok(())
    }
}

impl std::fmt::Debug for RequestSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bound = self
            .session
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false);
        f.debug_struct("RequestSessionManager")
            .field("bound", &bound)
            .finish_non_exhaustive()
    }
}
