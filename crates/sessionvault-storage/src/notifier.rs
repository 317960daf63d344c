//! Coalescing change notification for session managers.
//!
//! Listeners are held in a de-duplicating set per manager instance.
//! `notify()` never invokes listeners synchronously: it schedules one
//! deferred task and absorbs further calls while that task is pending, so
//! a burst of mutations awaited within one scheduling turn yields exactly
//! one invocation per listener.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use futures_util::future::join_all;
use tracing::debug;

/// A subscriber to session changes.
///
/// Listeners receive no payload; they re-read whatever state they care
/// about from the manager.
#[async_trait]
pub trait SessionListener: Send + Sync {
    async fn on_session_change(&self);
}

/// Adapter turning a plain closure into a [`SessionListener`].
struct FnListener<F>(F);

#[async_trait]
impl<F> SessionListener for FnListener<F>
where
    F: Fn() + Send + Sync,
{
    async fn on_session_change(&self) {
        (self.0)();
    }
}

struct NotifierInner {
    listeners: Mutex<Vec<Arc<dyn SessionListener>>>,
    pending: AtomicBool,
}

impl NotifierInner {
    fn lock_listeners(&self) -> std::sync::MutexGuard<'_, Vec<Arc<dyn SessionListener>>> {
        // Listener callbacks run outside the lock, so a poisoned mutex can
        // only mean a panic in the set bookkeeping itself; recover.
        self.listeners
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Per-manager listener hub with coalesced, deferred notification.
#[derive(Clone)]
pub struct ChangeNotifier {
    inner: Arc<NotifierInner>,
}

impl ChangeNotifier {
    /// Creates an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(NotifierInner {
                listeners: Mutex::new(Vec::new()),
                pending: AtomicBool::new(false),
            }),
        }
    }

    /// Subscribes a listener and returns a handle to unsubscribe it.
    ///
    /// Subscribing the same `Arc` again is a no-op for notification
    /// purposes: the listener still fires once per notification.
    pub fn subscribe(&self, listener: Arc<dyn SessionListener>) -> Subscription {
        let mut listeners = self.inner.lock_listeners();
        if !listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            listeners.push(Arc::clone(&listener));
        }
        Subscription {
            inner: Arc::downgrade(&self.inner),
            listener: Arc::downgrade(&listener),
        }
    }

    /// Convenience for subscribing a plain closure.
    pub fn subscribe_fn<F>(&self, f: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(FnListener(f)))
    }

    /// Number of currently subscribed listeners.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock_listeners().len()
    }

    /// Schedules a coalesced notification.
    ///
    /// If one is already pending the call is absorbed. Otherwise a
    /// one-shot deferred task is spawned that, when it runs, invokes every
    /// currently-subscribed listener, awaits them collectively, and then
    /// clears the pending flag. Unsubscribing after `notify()` but before
    /// the task runs does remove the listener from that notification;
    /// unsubscription never cancels an in-flight invocation.
    pub fn notify(&self) {
        if self.inner.pending.swap(true, Ordering::AcqRel) {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            // Blocking-facade mutation outside any runtime: nothing can
            // run the deferred task, so the notification is dropped.
            self.inner.pending.store(false, Ordering::Release);
            debug!("no async runtime; session change notification dropped");
            return;
        };
        let inner = Arc::clone(&self.inner);
        handle.spawn(async move {
            // Defer past the current scheduling turn so synchronous bursts
            // of mutations coalesce into one invocation.
            tokio::task::yield_now().await;
            let listeners: Vec<_> = inner.lock_listeners().iter().cloned().collect();
            debug!(listeners = listeners.len(), "dispatching session change");
            join_all(listeners.iter().map(|l| l.on_session_change())).await;
            inner.pending.store(false, Ordering::Release);
        });
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("subscriber_count", &self.subscriber_count())
            .field("pending", &self.inner.pending.load(Ordering::Acquire))
            .finish()
    }
}

/// Handle returned by [`ChangeNotifier::subscribe`].
///
/// Dropping the handle does NOT unsubscribe; call
/// [`Subscription::unsubscribe`] explicitly. Unsubscribing affects future
/// notifications only.
pub struct Subscription {
    inner: Weak<NotifierInner>,
    listener: Weak<dyn SessionListener>,
}

impl Subscription {
    /// Removes the listener from the hub.
    pub fn unsubscribe(self) {
        let (Some(inner), Some(listener)) = (self.inner.upgrade(), self.listener.upgrade()) else {
            return;
        };
        inner
            .lock_listeners()
            .retain(|l| !Arc::ptr_eq(l, &listener));
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct Counter(AtomicUsize);

    #[async_trait]
    impl SessionListener for Counter {
        async fn on_session_change(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn settle() {
        // Give the deferred dispatch task a chance to run and finish.
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn test_burst_coalesces_to_one_invocation() {
        let notifier = ChangeNotifier::new();
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let _sub = notifier.subscribe(counter.clone());

        for _ in 0..5 {
            notifier.notify();
        }
        settle().await;

        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_separated_notifications_fire_separately() {
        let notifier = ChangeNotifier::new();
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let _sub = notifier.subscribe(counter.clone());

        notifier.notify();
        settle().await;
        notifier.notify();
        settle().await;

        assert_eq!(counter.0.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_duplicate_subscription_fires_once() {
        let notifier = ChangeNotifier::new();
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let _a = notifier.subscribe(counter.clone());
        let _b = notifier.subscribe(counter.clone());
        assert_eq!(notifier.subscriber_count(), 1);

        notifier.notify();
        settle().await;

        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_future_notifications() {
        let notifier = ChangeNotifier::new();
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let sub = notifier.subscribe(counter.clone());

        notifier.notify();
        settle().await;
        sub.unsubscribe();
        notifier.notify();
        settle().await;

        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_all_listeners_invoked() {
        let notifier = ChangeNotifier::new();
        let a = Arc::new(Counter(AtomicUsize::new(0)));
        let b = Arc::new(Counter(AtomicUsize::new(0)));
        let _sa = notifier.subscribe(a.clone());
        let _sb = notifier.subscribe(b.clone());

        notifier.notify();
        settle().await;

        assert_eq!(a.0.load(Ordering::SeqCst), 1);
        assert_eq!(b.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_subscribe_fn() {
        let notifier = ChangeNotifier::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = hits.clone();
        let _sub = notifier.subscribe_fn(move || {
            hits2.fetch_add(1, Ordering::SeqCst);
        });

        notifier.notify();
        notifier.notify();
        settle().await;

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
