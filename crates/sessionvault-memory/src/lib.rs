//! # sessionvault-memory
//!
//! In-process memory backend. The simplest [`SessionManager`]: fragments
//! live in a concurrent map, reads and writes cannot fail, and a full
//! blocking facade is available (`async_store()` is `false`).
//!
//! [`SessionManager`]: sessionvault_storage::SessionManager

mod manager;

pub use manager::MemorySessionManager;
