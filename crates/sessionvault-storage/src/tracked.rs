//! Idle-activity tracking layered over any session manager.
//!
//! [`TrackedSessionManager`] is a decorator: it forwards every contract
//! call unchanged to the wrapped backend, and resets a sliding idle clock
//! on each `get`/`set`. When the clock expires the timeout callback fires
//! and the session is destroyed. No backend code is touched or subclassed.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use sessionvault_core::{
    ActivityTimeoutKind, SessionValue, SettingsHandle, StorageKey, TokenSnapshot,
};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, warn};

use crate::blocking::BlockingSessionManager;
use crate::error::StorageError;
use crate::manager::{DynSessionManager, SessionManager};
use crate::notifier::ChangeNotifier;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct TimerHandles {
    pre_warning: Option<JoinHandle<()>>,
    timeout: Option<JoinHandle<()>>,
}

impl TimerHandles {
    fn cancel(&mut self) {
        if let Some(handle) = self.pre_warning.take() {
            handle.abort();
        }
        if let Some(handle) = self.timeout.take() {
            handle.abort();
        }
    }
}

struct TrackerInner {
    settings: SettingsHandle,
    primary: Mutex<Option<DynSessionManager>>,
    insecure: Mutex<Option<DynSessionManager>>,
    timers: Mutex<TimerHandles>,
}

impl TrackerInner {
    fn fire_pre_warning(&self) {
        let settings = self.settings.current();
        debug!("activity pre-warning elapsed");
        if let Some(handler) = settings.on_activity_timeout.as_ref() {
            handler(ActivityTimeoutKind::PreWarning, None);
        }
    }

    async fn fire_timeout(self: Arc<Self>) {
        let settings = self.settings.current();
        let primary = lock(&self.primary).clone();
        let insecure = lock(&self.insecure).clone();

        // Read the tokens before destroying anything so the callback can
        // still see them.
        let snapshot = match primary.as_deref() {
            Some(manager) => Some(snapshot_tokens(manager, insecure.as_deref()).await),
            None => None,
        };

        debug!("activity timeout elapsed, destroying session");
        if let Some(handler) = settings.on_activity_timeout.as_ref() {
            handler(ActivityTimeoutKind::Timeout, snapshot);
        }

        if let Some(manager) = primary {
            if let Err(error) = manager.destroy_session().await {
                warn!(%error, backend = manager.backend_name(), "failed to destroy session after activity timeout");
            }
        }
        // Companion cleanup is best-effort; its failure never interrupts
        // the timeout sequence.
        if let Some(manager) = insecure {
            if let Err(error) = manager.destroy_session().await {
                warn!(%error, backend = manager.backend_name(), "failed to destroy insecure companion session");
            }
        }
    }
}

/// Reads a best-effort token snapshot.
///
/// The refresh token comes from the insecure companion store when one is
/// registered, since that is where it lives under
/// `use_insecure_for_refresh_token`.
async fn snapshot_tokens(
    primary: &dyn SessionManager,
    insecure: Option<&dyn SessionManager>,
) -> TokenSnapshot {
    let refresh_source = insecure.unwrap_or(primary);
    TokenSnapshot {
        access_token: primary
            .get_session_item(&StorageKey::AccessToken)
            .await
            .unwrap_or(None),
        id_token: primary
            .get_session_item(&StorageKey::IdToken)
            .await
            .unwrap_or(None),
        refresh_token: refresh_source
            .get_session_item(&StorageKey::RefreshToken)
            .await
            .unwrap_or(None),
    }
}

/// Sliding idle-clock state machine.
///
/// States: *inactive* (no timers, entered whenever no timeout is
/// configured), *armed* (timers pending). Every tracked call cancels the
/// pending timers and starts fresh ones from "now", so repeated activity
/// defers expiry indefinitely by design. Timers are plain tokio tasks and
/// are always aborted before being rearmed.
#[derive(Clone)]
pub struct ActivityTracker {
    inner: Arc<TrackerInner>,
}

impl ActivityTracker {
    /// Creates a tracker reading the live settings through `settings`.
    #[must_use]
    pub fn new(settings: SettingsHandle) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                settings,
                primary: Mutex::new(None),
                insecure: Mutex::new(None),
                timers: Mutex::new(TimerHandles::default()),
            }),
        }
    }

    /// Registers the session manager destroyed on timeout.
    pub fn register_primary(&self, manager: DynSessionManager) {
        *lock(&self.inner.primary) = Some(manager);
    }

    /// Registers the insecure companion manager. Its destroy failures are
    /// swallowed so the primary sequence always completes.
    pub fn register_insecure(&self, manager: DynSessionManager) {
        *lock(&self.inner.insecure) = Some(manager);
    }

    /// Explicitly resets the idle clock.
    ///
    /// # Errors
    ///
    /// - `Session manager not found` if no primary manager is registered
    /// - `No activity timeout minutes set` if no timeout is configured
    /// - a configuration error if the pre-warning is not strictly less
    ///   than the timeout
    pub fn update_activity(&self) -> Result<(), StorageError> {
        if lock(&self.inner.primary).is_none() {
            return Err(StorageError::session_manager_not_found());
        }
        let settings = self.inner.settings.current();
        let Some(timeout) = settings.activity_timeout_minutes else {
            return Err(StorageError::no_activity_timeout());
        };
        self.arm(timeout, settings.activity_timeout_pre_warning_minutes)
    }

    /// Resets the idle clock on behalf of a tracked call.
    ///
    /// An unset timeout means tracking is off: the clock is disarmed and
    /// the call proceeds. A misordered pre-warning still fails fast.
    pub fn touch(&self) -> Result<(), StorageError> {
        let settings = self.inner.settings.current();
        match settings.activity_timeout_minutes {
            None => {
                self.disarm();
                Ok(())
            }
            Some(timeout) => self.arm(timeout, settings.activity_timeout_pre_warning_minutes),
        }
    }

    /// Cancels any pending timers.
    pub fn disarm(&self) {
        lock(&self.inner.timers).cancel();
    }

    fn arm(&self, timeout_minutes: u64, pre_warning_minutes: Option<u64>) -> Result<(), StorageError> {
        if let Some(pre_warning) = pre_warning_minutes {
            if pre_warning >= timeout_minutes {
                return Err(StorageError::pre_warning_not_before_timeout(
                    pre_warning,
                    timeout_minutes,
                ));
            }
        }

        let mut timers = lock(&self.inner.timers);
        timers.cancel();

        // Deadlines are fixed here, not when the spawned task first runs,
        // so the idle window is measured from the tracked call itself.
        let now = Instant::now();

        if let Some(pre_warning) = pre_warning_minutes {
            let deadline = now + Duration::from_secs(pre_warning * 60);
            let inner = Arc::clone(&self.inner);
            timers.pre_warning = Some(tokio::spawn(async move {
                sleep_until(deadline).await;
                inner.fire_pre_warning();
            }));
        }

        let deadline = now + Duration::from_secs(timeout_minutes * 60);
        let inner = Arc::clone(&self.inner);
        timers.timeout = Some(tokio::spawn(async move {
            sleep_until(deadline).await;
            inner.fire_timeout().await;
        }));

        Ok(())
    }
}

impl std::fmt::Debug for ActivityTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let timers = lock(&self.inner.timers);
        f.debug_struct("ActivityTracker")
            .field("has_primary", &lock(&self.inner.primary).is_some())
            .field("has_insecure", &lock(&self.inner.insecure).is_some())
            .field("armed", &timers.timeout.is_some())
            .finish()
    }
}

/// Decorator adding idle-activity tracking to any backend.
///
/// `get_session_item` and `set_session_item` first reset the idle clock,
/// then forward unchanged; values are never altered. All other operations
/// forward directly.
pub struct TrackedSessionManager {
    inner: DynSessionManager,
    tracker: ActivityTracker,
}

impl TrackedSessionManager {
    /// Wraps `inner`, registering it as the tracker's primary manager.
    #[must_use]
    pub fn new(inner: DynSessionManager, settings: SettingsHandle) -> Self {
        Self::with_tracker(inner, ActivityTracker::new(settings))
    }

    /// Wraps `inner` over an existing tracker (e.g. one shared with a
    /// direct `update_activity` caller).
    #[must_use]
    pub fn with_tracker(inner: DynSessionManager, tracker: ActivityTracker) -> Self {
        tracker.register_primary(Arc::clone(&inner));
        Self { inner, tracker }
    }

    /// Registers the insecure companion destroyed (best-effort) on
    /// timeout.
    #[must_use]
    pub fn with_insecure(self, insecure: DynSessionManager) -> Self {
        self.tracker.register_insecure(insecure);
        self
    }

    /// Returns the tracker for direct idle-clock access.
    #[must_use]
    pub fn tracker(&self) -> &ActivityTracker {
        &self.tracker
    }

    /// Returns the wrapped manager.
    #[must_use]
    pub fn inner(&self) -> &DynSessionManager {
        &self.inner
    }
}

#[async_trait]
impl SessionManager for TrackedSessionManager {
    async fn get_session_item(&self, key: &StorageKey) -> Result<Option<String>, StorageError> {
        self.tracker.touch()?;
        self.inner.get_session_item(key).await
    }

    async fn set_session_item(
        &self,
        key: &StorageKey,
        value: SessionValue,
    ) -> Result<(), StorageError> {
        self.tracker.touch()?;
        self.inner.set_session_item(key, value).await
    }

    async fn remove_session_item(&self, key: &StorageKey) -> Result<(), StorageError> {
        self.inner.remove_session_item(key).await
    }

    async fn destroy_session(&self) -> Result<(), StorageError> {
        self.inner.destroy_session().await
    }

    fn async_store(&self) -> bool {
        self.inner.async_store()
    }

    fn as_blocking(&self) -> Option<&dyn BlockingSessionManager> {
        // Expose a blocking facade only when the wrapped backend has one,
        // routed through self so blocking calls also reset the clock.
        self.inner.as_blocking().map(|_| self as _)
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }

    fn notifier(&self) -> &ChangeNotifier {
        self.inner.notifier()
    }
}

impl BlockingSessionManager for TrackedSessionManager {
    fn get_session_item_blocking(
        &self,
        key: &StorageKey,
    ) -> Result<Option<String>, StorageError> {
        let blocking = self.inner.as_blocking().ok_or(StorageError::AsyncOnly)?;
        self.tracker.touch()?;
        blocking.get_session_item_blocking(key)
    }

    fn set_session_item_blocking(
        &self,
        key: &StorageKey,
        value: SessionValue,
    ) -> Result<(), StorageError> {
        let blocking = self.inner.as_blocking().ok_or(StorageError::AsyncOnly)?;
        self.tracker.touch()?;
        blocking.set_session_item_blocking(key, value)
    }

    fn remove_session_item_blocking(&self, key: &StorageKey) -> Result<(), StorageError> {
        self.inner
            .as_blocking()
            .ok_or(StorageError::AsyncOnly)?
            .remove_session_item_blocking(key)
    }

    fn destroy_session_blocking(&self) -> Result<(), StorageError> {
        self.inner
            .as_blocking()
            .ok_or(StorageError::AsyncOnly)?
            .destroy_session_blocking()
    }
}

impl std::fmt::Debug for TrackedSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedSessionManager")
            .field("backend", &self.inner.backend_name())
            .field("tracker", &self.tracker)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sessionvault_core::SessionSettings;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::time::advance;

    /// Minimal contract implementation for exercising the decorator.
    struct MockManager {
        items: Mutex<HashMap<StorageKey, String>>,
        notifier: ChangeNotifier,
        fail_destroy: AtomicBool,
    }

    impl MockManager {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                items: Mutex::new(HashMap::new()),
                notifier: ChangeNotifier::new(),
                fail_destroy: AtomicBool::new(false),
            })
        }

        fn failing_destroy() -> Arc<Self> {
            let mock = Self::new();
            mock.fail_destroy.store(true, Ordering::SeqCst);
            mock
        }
    }

    #[async_trait]
    impl SessionManager for MockManager {
        async fn get_session_item(
            &self,
            key: &StorageKey,
        ) -> Result<Option<String>, StorageError> {
            Ok(lock(&self.items).get(key).cloned())
        }

        async fn set_session_item(
            &self,
            key: &StorageKey,
            value: SessionValue,
        ) -> Result<(), StorageError> {
            lock(&self.items).insert(key.clone(), value.serialize());
            Ok(())
        }

        async fn remove_session_item(&self, key: &StorageKey) -> Result<(), StorageError> {
            lock(&self.items).remove(key);
            Ok(())
        }

        async fn destroy_session(&self) -> Result<(), StorageError> {
            if self.fail_destroy.load(Ordering::SeqCst) {
                return Err(StorageError::unavailable("destroy refused"));
            }
            lock(&self.items).clear();
            Ok(())
        }

        fn backend_name(&self) -> &'static str {
            "mock"
        }

        fn notifier(&self) -> &ChangeNotifier {
            &self.notifier
        }
    }

    type FiredEvents = Arc<Mutex<Vec<(ActivityTimeoutKind, Option<TokenSnapshot>)>>>;

    fn settings_with_timeout(timeout: Option<u64>, pre_warning: Option<u64>) -> (SettingsHandle, FiredEvents) {
        let fired: FiredEvents = Arc::new(Mutex::new(Vec::new()));
        let sink = fired.clone();
        let mut settings = SessionSettings::default();
        settings.activity_timeout_minutes = timeout;
        settings.activity_timeout_pre_warning_minutes = pre_warning;
        settings.on_activity_timeout = Some(Arc::new(move |kind, snapshot| {
            lock(&sink).push((kind, snapshot));
        }));
        (SettingsHandle::with_settings(settings), fired)
    }

    async fn drain() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    const MIN: u64 = 60;

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fires_exactly_once_at_deadline() {
        let (settings, fired) = settings_with_timeout(Some(30), None);
        let mock = MockManager::new();
        let tracked = TrackedSessionManager::new(mock.clone(), settings);

        tracked
            .set_session_item(&StorageKey::AccessToken, "tok".into())
            .await
            .unwrap();

        advance(Duration::from_secs(29 * MIN + 59)).await;
        drain().await;
        assert!(lock(&fired).is_empty(), "fired before the deadline");

        advance(Duration::from_secs(1)).await;
        drain().await;
        {
            let events = lock(&fired);
            assert_eq!(events.len(), 1);
            assert_eq!(events[0].0, ActivityTimeoutKind::Timeout);
            let snapshot = events[0].1.as_ref().unwrap();
            assert_eq!(snapshot.access_token.as_deref(), Some("tok"));
        }
        // Session destroyed after the callback.
        assert!(lock(&mock.items).is_empty());

        advance(Duration::from_secs(120 * MIN)).await;
        drain().await;
        assert_eq!(lock(&fired).len(), 1, "fired more than once");
    }

    #[tokio::test(start_paused = true)]
    async fn test_pre_warning_then_timeout() {
        let (settings, fired) = settings_with_timeout(Some(30), Some(25));
        let mock = MockManager::new();
        let tracked = TrackedSessionManager::new(mock.clone(), settings);

        tracked
            .get_session_item(&StorageKey::AccessToken)
            .await
            .unwrap();

        advance(Duration::from_secs(25 * MIN)).await;
        drain().await;
        {
            let events = lock(&fired);
            assert_eq!(events.len(), 1);
            assert_eq!(events[0].0, ActivityTimeoutKind::PreWarning);
            assert!(events[0].1.is_none());
        }

        advance(Duration::from_secs(5 * MIN)).await;
        drain().await;
        let events = lock(&fired);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].0, ActivityTimeoutKind::Timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_resets_idle_clock() {
        let (settings, fired) = settings_with_timeout(Some(30), None);
        let mock = MockManager::new();
        let tracked = TrackedSessionManager::new(mock.clone(), settings);

        tracked
            .set_session_item(&StorageKey::State, "a".into())
            .await
            .unwrap();
        advance(Duration::from_secs(20 * MIN)).await;
        drain().await;

        // Renewed activity at +20min pushes expiry to +50min.
        tracked
            .get_session_item(&StorageKey::State)
            .await
            .unwrap();
        advance(Duration::from_secs(20 * MIN)).await;
        drain().await;
        assert!(lock(&fired).is_empty());

        advance(Duration::from_secs(10 * MIN)).await;
        drain().await;
        assert_eq!(lock(&fired).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_insecure_destroy_failure_is_swallowed() {
        let (settings, fired) = settings_with_timeout(Some(5), None);
        let mock = MockManager::new();
        let insecure = MockManager::failing_destroy();
        let tracked =
            TrackedSessionManager::new(mock.clone(), settings).with_insecure(insecure.clone());

        tracked
            .set_session_item(&StorageKey::AccessToken, "tok".into())
            .await
            .unwrap();
        advance(Duration::from_secs(5 * MIN)).await;
        drain().await;

        // The callback fired and the primary was destroyed even though the
        // companion refused.
        assert_eq!(lock(&fired).len(), 1);
        assert!(lock(&mock.items).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_timeout_configured_means_inactive() {
        let (settings, fired) = settings_with_timeout(None, None);
        let mock = MockManager::new();
        let tracked = TrackedSessionManager::new(mock.clone(), settings);

        tracked
            .set_session_item(&StorageKey::State, "a".into())
            .await
            .unwrap();
        advance(Duration::from_secs(600 * MIN)).await;
        drain().await;

        assert!(lock(&fired).is_empty());
        assert_eq!(
            tracked
                .get_session_item(&StorageKey::State)
                .await
                .unwrap()
                .as_deref(),
            Some("a")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_misordered_pre_warning_fails_fast() {
        let (settings, _fired) = settings_with_timeout(Some(20), Some(25));
        let mock = MockManager::new();
        let tracked = TrackedSessionManager::new(mock.clone(), settings);

        let error = tracked
            .set_session_item(&StorageKey::State, "a".into())
            .await
            .unwrap_err();
        assert!(error.is_configuration());
    }

    #[tokio::test]
    async fn test_update_activity_requires_manager_and_timeout() {
        let (settings, _fired) = settings_with_timeout(None, None);
        let tracker = ActivityTracker::new(settings.clone());

        let error = tracker.update_activity().unwrap_err();
        assert_eq!(error.to_string(), "Session manager not found");

        tracker.register_primary(MockManager::new());
        let error = tracker.update_activity().unwrap_err();
        assert_eq!(error.to_string(), "No activity timeout minutes set");

        settings.update(|s| s.activity_timeout_minutes = Some(30));
        tracker.update_activity().unwrap();
        tracker.disarm();
    }

    #[tokio::test(start_paused = true)]
    async fn test_values_forward_unchanged() {
        let (settings, _fired) = settings_with_timeout(Some(30), None);
        let mock = MockManager::new();
        let tracked = TrackedSessionManager::new(mock.clone(), settings);

        tracked
            .set_session_item(&StorageKey::Nonce, "n-123".into())
            .await
            .unwrap();
        assert_eq!(
            tracked
                .get_session_item(&StorageKey::Nonce)
                .await
                .unwrap()
                .as_deref(),
            Some("n-123")
        );
        tracked.tracker().disarm();
    }
}
