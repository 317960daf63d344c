//! Cookie-backed session manager.

use std::sync::Arc;

use async_trait::async_trait;
use sessionvault_core::{SessionValue, SettingsHandle, StorageKey, physical_key, split_value};
use sessionvault_storage::{AdapterError, ChangeNotifier, SessionManager, StorageError};
use tracing::warn;

use crate::adapter::{CookieAdapter, CookieOptions};

/// Hard cap on characters per cookie fragment. Browsers reject cookies
/// around 4 KiB including name and attributes, so the value stays well
/// below that.
pub const COOKIE_MAX_LENGTH: usize = 3000;

/// Session manager persisting fragments as individual cookies.
pub struct CookieSessionManager {
    adapter: Arc<dyn CookieAdapter>,
    settings: SettingsHandle,
    notifier: ChangeNotifier,
    options: CookieOptions,
    max_cookie_length: usize,
}

impl CookieSessionManager {
    /// Creates a cookie backend over the injected adapter.
    ///
    /// Warns once if the current settings allow persisting refresh tokens
    /// here: cookies travel with every request and offer weaker
    /// confidentiality than secure storage.
    #[must_use]
    pub fn new(adapter: Arc<dyn CookieAdapter>, settings: SettingsHandle) -> Self {
        if settings.current().use_insecure_for_refresh_token {
            warn!(
                "use_insecure_for_refresh_token is set; refresh tokens will be persisted in cookies"
            );
        }
        Self {
            adapter,
            settings,
            notifier: ChangeNotifier::new(),
            options: CookieOptions::default(),
            max_cookie_length: COOKIE_MAX_LENGTH,
        }
    }

    /// Replaces the attributes applied to written cookies.
    #[must_use]
    pub fn with_options(mut self, options: CookieOptions) -> Self {
        self.options = options;
        self
    }

    /// Overrides the per-cookie fragment cap.
    #[must_use]
    pub fn with_max_cookie_length(mut self, max_cookie_length: usize) -> Self {
        self.max_cookie_length = max_cookie_length;
        self
    }

    fn fragment_cap(&self) -> usize {
        self.settings.current().max_length.min(self.max_cookie_length)
    }

    async fn read_joined(&self, key: &StorageKey) -> Result<Option<String>, AdapterError> {
        let prefix = self.settings.current().key_prefix.clone();
        let mut joined = String::new();
        let mut index = 0;
        loop {
            match self.adapter.get(&physical_key(&prefix, key, index)).await? {
                Some(fragment) => {
                    joined.push_str(&fragment);
                    index += 1;
                }
                None => break,
            }
        }
        Ok(if index == 0 { None } else { Some(joined) })
    }

    /// Deletes the contiguous fragment run for `key`. Cookies cannot be
    /// enumerated, so cleanup stops at the first absent index.
    async fn delete_run(&self, key: &StorageKey) -> Result<(), AdapterError> {
        let prefix = self.settings.current().key_prefix.clone();
        let mut index = 0;
        loop {
            let name = physical_key(&prefix, key, index);
            if self.adapter.get(&name).await?.is_none() {
                break;
            }
            self.adapter.delete(&name, &self.options).await?;
            index += 1;
        }
        Ok(())
    }

    async fn write(&self, key: &StorageKey, value: &SessionValue) -> Result<(), AdapterError> {
        self.delete_run(key).await?;
        let prefix = self.settings.current().key_prefix.clone();
        match value {
            SessionValue::Text(text) => {
                for (index, fragment) in
                    split_value(text, self.fragment_cap()).into_iter().enumerate()
                {
                    self.adapter
                        .set(&physical_key(&prefix, key, index), &fragment, &self.options)
                        .await?;
                }
            }
            other => {
                self.adapter
                    .set(
                        &physical_key(&prefix, key, 0),
                        &other.serialize(),
                        &self.options,
                    )
                    .await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SessionManager for CookieSessionManager {
    async fn get_session_item(&self, key: &StorageKey) -> Result<Option<String>, StorageError> {
        match self.read_joined(key).await {
            Ok(value) => Ok(value),
            Err(error) => {
                // Best-effort read: a transient cookie failure degrades to
                // "no session" rather than crashing the caller.
                warn!(key = %key, %error, "cookie read failed, treating session item as absent");
                Ok(None)
            }
        }
    }

    async fn set_session_item(
        &self,
        key: &StorageKey,
        value: SessionValue,
    ) -> Result<(), StorageError> {
        self.write(key, &value)
            .await
            .map_err(|source| StorageError::write_failed("cookie", source))?;
        self.notifier.notify();
        Ok(())
    }

    async fn remove_session_item(&self, key: &StorageKey) -> Result<(), StorageError> {
        self.delete_run(key)
            .await
            .map_err(|source| StorageError::write_failed("cookie", source))?;
        self.notifier.notify();
        Ok(())
    }

    async fn destroy_session(&self) -> Result<(), StorageError> {
        for key in StorageKey::WELL_KNOWN {
            self.delete_run(&key)
                .await
                .map_err(|source| StorageError::write_failed("cookie", source))?;
        }
        self.notifier.notify();
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "cookie"
    }

    fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }
}

impl std::fmt::Debug for CookieSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieSessionManager")
            .field("options", &self.options)
            .field("max_cookie_length", &self.max_cookie_length)
            .finish_non_exhaustive()
    }
}
