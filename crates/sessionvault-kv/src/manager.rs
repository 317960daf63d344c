//! Session manager over an eventually-consistent key-value service.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sessionvault_core::{
    SessionValue, SettingsHandle, StorageKey, is_fragment_of, physical_key, split_value,
};
use sessionvault_storage::{AdapterError, ChangeNotifier, SessionManager, StorageError};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::client::KvClient;

/// Consistency and expiry options for the KV backend.
#[derive(Debug, Clone)]
pub struct KvOptions {
    /// Per-fragment time-to-live. Fragments expire independently.
    pub ttl: Option<Duration>,
    /// Verification / lagged-read retry budget. `0` disables both.
    pub consistency_retries: u32,
    /// Base backoff; pass `n` sleeps `consistency_delay * n`.
    pub consistency_delay: Duration,
}

impl Default for KvOptions {
    fn default() -> Self {
        Self {
            ttl: None,
            consistency_retries: 0,
            consistency_delay: Duration::from_millis(100),
        }
    }
}

/// Session manager persisting fragments in an external KV service.
pub struct KvSessionManager {
    client: Arc<dyn KvClient>,
    settings: SettingsHandle,
    notifier: ChangeNotifier,
    options: KvOptions,
}

impl KvSessionManager {
    /// Creates a KV backend over the injected client with default options.
    ///
    /// Warns once if the current settings allow persisting refresh tokens
    /// here: an edge KV namespace is readable by anything holding the
    /// namespace credentials.
    #[must_use]
    pub fn new(client: Arc<dyn KvClient>, settings: SettingsHandle) -> Self {
        Self::with_options(client, settings, KvOptions::default())
    }

    /// Creates a KV backend with explicit consistency/expiry options.
    #[must_use]
    pub fn with_options(
        client: Arc<dyn KvClient>,
        settings: SettingsHandle,
        options: KvOptions,
    ) -> Self {
        if settings.current().use_insecure_for_refresh_token {
            warn!(
                "use_insecure_for_refresh_token is set; refresh tokens will be persisted in the KV namespace"
            );
        }
        Self {
            client,
            settings,
            notifier: ChangeNotifier::new(),
            options,
        }
    }

    async fn read_joined(&self, key: &StorageKey) -> Result<Option<String>, AdapterError> {
        let prefix = self.settings.current().key_prefix.clone();
        let mut joined = String::new();
        let mut index = 0;
        loop {
            match self.client.get(&physical_key(&prefix, key, index)).await? {
                Some(fragment) => {
                    joined.push_str(&fragment);
                    index += 1;
                }
                None => break,
            }
        }
        Ok(if index == 0 { None } else { Some(joined) })
    }

    /// Deletes every stored fragment of `key`, orphans included, by
    /// enumerating the namespace.
    async fn delete_fragments(&self, key: &StorageKey) -> Result<(), AdapterError> {
        let prefix = self.settings.current().key_prefix.clone();
        let scan = format!("{prefix}{key}");
        for name in self.client.list(&scan).await? {
            if is_fragment_of(&name, &prefix, key) {
                self.client.delete(&name).await?;
            }
        }
        Ok(())
    }

    fn serialized_fragments(&self, value: &SessionValue) -> Vec<String> {
        match value {
            SessionValue::Text(text) => {
                split_value(text, self.settings.current().max_length)
            }
            other => vec![other.serialize()],
        }
    }

    /// Advisory read-after-write verification.
    ///
    /// Confirms the just-written value is visible, retrying with growing
    /// backoff. Never rewrites and never fails the caller: a persistent
    /// mismatch only logs a warning.
    async fn verify_write(&self, key: &StorageKey, expected: &str) {
        let retries = self.options.consistency_retries;
        for attempt in 1..=retries {
            match self.read_joined(key).await {
                Ok(Some(observed)) if observed == expected => {
                    debug!(key = %key, attempt, "kv write verified");
                    return;
                }
                Ok(_) => {}
                Err(error) => {
                    debug!(key = %key, attempt, %error, "kv verification read failed");
                }
            }
            if attempt < retries {
                sleep(self.options.consistency_delay * attempt).await;
            }
        }
        if retries > 0 {
            warn!(
                key = %key,
                retries,
                "kv write not observed by read-after-write verification; reporting success anyway"
            );
        }
    }

    /// Read with bounded retries, tolerating replication lag after a very
    /// recent write elsewhere.
    async fn read_with_retries(&self, key: &StorageKey) -> Result<Option<String>, AdapterError> {
        let mut value = self.read_joined(key).await?;
        let mut attempt = 1;
        while value.is_none() && attempt <= self.options.consistency_retries {
            sleep(self.options.consistency_delay * attempt).await;
            value = self.read_joined(key).await?;
            attempt += 1;
        }
        Ok(value)
    }
}

#[async_trait]
impl SessionManager for KvSessionManager {
    async fn get_session_item(&self, key: &StorageKey) -> Result<Option<String>, StorageError> {
        match self.read_with_retries(key).await {
            Ok(value) => Ok(value),
            Err(error) => {
                // Best-effort read: a KV outage degrades to "no session".
                warn!(key = %key, %error, "kv read failed, treating session item as absent");
                Ok(None)
            }
        }
    }

    async fn set_session_item(
        &self,
        key: &StorageKey,
        value: SessionValue,
    ) -> Result<(), StorageError> {
        self.delete_fragments(key)
            .await
            .map_err(|source| StorageError::write_failed("kv", source))?;

        let prefix = self.settings.current().key_prefix.clone();
        let fragments = self.serialized_fragments(&value);
        for (index, fragment) in fragments.iter().enumerate() {
            self.client
                .put(
                    &physical_key(&prefix, key, index),
                    fragment,
                    self.options.ttl,
                )
                .await
                .map_err(|source| StorageError::write_failed("kv", source))?;
        }

        if self.options.consistency_retries > 0 {
            self.verify_write(key, &fragments.concat()).await;
        }
        self.notifier.notify();
        Ok(())
    }

    async fn remove_session_item(&self, key: &StorageKey) -> Result<(), StorageError> {
        self.delete_fragments(key)
            .await
            .map_err(|source| StorageError::write_failed("kv", source))?;
        self.notifier.notify();
        Ok(())
    }

    async fn destroy_session(&self) -> Result<(), StorageError> {
        let prefix = self.settings.current().key_prefix.clone();
        let names = self
            .client
            .list(&prefix)
            .await
            .map_err(|source| StorageError::write_failed("kv", source))?;
        for name in names {
            self.client
                .delete(&name)
                .await
                .map_err(|source| StorageError::write_failed("kv", source))?;
        }
        self.notifier.notify();
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "kv"
    }

    fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }
}

impl std::fmt::Debug for KvSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvSessionManager")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
