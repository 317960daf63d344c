//! # sessionvault-host
//!
//! Backends over storage facilities the host environment provides:
//!
//! - [`LocalStorageManager`] — a synchronous browser-style key-value
//!   store, async-wrapped; reads and writes cannot fail
//! - [`ExtensionStorageManager`] — a callback-style async store (browser
//!   extension storage areas); every failure propagates
//! - [`RequestSessionManager`] — a mutable per-request session object
//!   bound by framework middleware; direct lookups, single-fragment fast
//!   path
//! - [`SecureStorageManager`] — a platform secure enclave attached as a
//!   capability after construction; string values only, tight fragment
//!   cap
//!
//! Each backend takes its physical store as an injected trait object, so
//! this crate compiles everywhere and the platform glue stays in the
//! host.

mod extension;
mod local;
mod request;
mod secure;

pub use extension::{ExtensionStorageManager, ExtensionStore};
pub use local::{LocalStorageManager, LocalStore};
pub use request::{RequestSessionManager, SessionObject};
pub use secure::{SECURE_MAX_LENGTH, SecureStorageManager, SecureStore};
