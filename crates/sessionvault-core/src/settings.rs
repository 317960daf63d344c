//! Live, hot-swappable storage settings.
//!
//! Every backend reads the settings through a shared [`SettingsHandle`] on
//! every operation, never caching a snapshot. Changing the key prefix (or
//! any other field) is therefore visible to the very next call on any
//! backend sharing the handle, without re-instantiating anything.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::hooks::{ActivityTimeoutHandler, RefreshHandler};

/// Default physical key prefix. Bit-exact for interop with sessions
/// persisted by the other SDKs.
pub const DEFAULT_KEY_PREFIX: &str = "kinde-";

/// Default fragment cap in characters.
pub const DEFAULT_MAX_LENGTH: usize = 2000;

/// Process-wide storage configuration record.
#[derive(Clone)]
pub struct SessionSettings {
    /// Prefix prepended to every physical slot name.
    pub key_prefix: String,
    /// Maximum characters per fragment. `0` means values cannot be
    /// represented at all.
    pub max_length: usize,
    /// Allow persisting refresh tokens in stores with weaker
    /// confidentiality guarantees. Backends warn once when enabled.
    pub use_insecure_for_refresh_token: bool,
    /// Idle minutes before the tracked session is destroyed. Unset
    /// disables activity tracking.
    pub activity_timeout_minutes: Option<u64>,
    /// Idle minutes before the pre-warning callback fires. Must be
    /// strictly less than `activity_timeout_minutes` when both are set.
    pub activity_timeout_pre_warning_minutes: Option<u64>,
    /// Invoked on pre-warning and timeout.
    pub on_activity_timeout: Option<ActivityTimeoutHandler>,
    /// Host hook for token refresh; carried here, called elsewhere.
    pub on_refresh_handler: Option<RefreshHandler>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            max_length: DEFAULT_MAX_LENGTH,
            use_insecure_for_refresh_token: false,
            activity_timeout_minutes: None,
            activity_timeout_pre_warning_minutes: None,
            on_activity_timeout: None,
            on_refresh_handler: None,
        }
    }
}

impl fmt::Debug for SessionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSettings")
            .field("key_prefix", &self.key_prefix)
            .field("max_length", &self.max_length)
            .field(
                "use_insecure_for_refresh_token",
                &self.use_insecure_for_refresh_token,
            )
            .field("activity_timeout_minutes", &self.activity_timeout_minutes)
            .field(
                "activity_timeout_pre_warning_minutes",
                &self.activity_timeout_pre_warning_minutes,
            )
            .field("on_activity_timeout", &self.on_activity_timeout.is_some())
            .field("on_refresh_handler", &self.on_refresh_handler.is_some())
            .finish()
    }
}

/// Cheap-to-clone handle to the live settings record.
///
/// Reads are lock-free loads; writers replace the whole record. Backends
/// must call [`SettingsHandle::current`] at operation time rather than
/// keeping the returned `Arc` around.
#[derive(Clone)]
pub struct SettingsHandle {
    inner: Arc<ArcSwap<SessionSettings>>,
}

impl SettingsHandle {
    /// Creates a handle over default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(SessionSettings::default())
    }

    /// Creates a handle over the given initial settings.
    #[must_use]
    pub fn with_settings(settings: SessionSettings) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(settings)),
        }
    }

    /// Loads the current settings record.
    #[must_use]
    pub fn current(&self) -> Arc<SessionSettings> {
        self.inner.load_full()
    }

    /// Replaces the settings record wholesale.
    pub fn replace(&self, settings: SessionSettings) {
        self.inner.store(Arc::new(settings));
    }

    /// Applies a mutation to a copy of the current record and publishes it.
    ///
    /// Visible to the next operation on every backend sharing this handle.
    pub fn update<F>(&self, mutate: F)
    where
        F: FnOnce(&mut SessionSettings),
    {
        let mut settings = (*self.inner.load_full()).clone();
        mutate(&mut settings);
        self.inner.store(Arc::new(settings));
    }
}

impl Default for SettingsHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SettingsHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsHandle")
            .field("current", &self.current())
            .finish()
    }
}
