//! # sessionvault-storage
//!
//! The [`SessionManager`] contract every sessionvault backend implements,
//! plus the cross-cutting behavior shared by all of them:
//!
//! - batch helpers (`set_items`/`get_items`/`remove_items`) built on the
//!   four primitives with parallel dispatch
//! - the coalescing listener hub ([`ChangeNotifier`])
//! - the blocking facade for backends with a direct access path
//! - idle-activity tracking as a decorator ([`TrackedSessionManager`])
//!
//! This crate contains no backend. Backends live in their own crates
//! (`sessionvault-memory`, `sessionvault-cookie`, `sessionvault-kv`,
//! `sessionvault-host`).
//!
//! ## Implementing a backend
//!
//! ```ignore
//! use async_trait::async_trait;
//! use sessionvault_storage::{ChangeNotifier, SessionManager, StorageError};
//!
//! struct MyBackend {
//!     notifier: ChangeNotifier,
//!     // ...
//! }
//!
//! #[async_trait]
//! impl SessionManager for MyBackend {
//!     // ... the four primitives; call self.notifier.notify() after
//!     // every successful mutation
//! #   fn backend_name(&self) -> &'static str { "my-backend" }
//! #   fn notifier(&self) -> &ChangeNotifier { &self.notifier }
//! }
//! ```

mod blocking;
mod error;
mod manager;
mod notifier;
mod tracked;

pub use blocking::{
    BlockingSessionManager, blocking_destroy, blocking_get, blocking_remove, blocking_set,
};
pub use error::{AdapterError, ErrorCategory, StorageError};
pub use manager::{DynSessionManager, SessionManager};
pub use notifier::{ChangeNotifier, SessionListener, Subscription};
pub use tracked::{ActivityTracker, TrackedSessionManager};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use sessionvault_storage::prelude::*;
/// ```
pub mod prelude {
    pub use crate::blocking::{
        BlockingSessionManager, blocking_destroy, blocking_get, blocking_remove, blocking_set,
    };
    pub use crate::error::{AdapterError, ErrorCategory, StorageError};
    pub use crate::manager::{DynSessionManager, SessionManager};
    pub use crate::notifier::{ChangeNotifier, SessionListener, Subscription};
    pub use crate::tracked::{ActivityTracker, TrackedSessionManager};
    pub use crate::StorageResult;
    pub use sessionvault_core::{
        SessionSettings, SessionValue, SettingsHandle, StorageKey,
    };
}
