//! # sessionvault-core
//!
//! Core types shared by every sessionvault storage backend.
//!
//! This crate carries no I/O. It defines:
//! - [`StorageKey`], the logical names under which auth artifacts are stored
//! - [`SessionValue`], the tagged value variant accepted by writes
//! - the chunk codec ([`split_value`] / [`join_value`]) that fits long
//!   values into size-capped physical slots
//! - [`SettingsHandle`], the live configuration record read fresh on every
//!   storage operation

mod chunk;
mod hooks;
mod keys;
mod settings;
mod value;

pub use chunk::{join_value, split_value};
pub use hooks::{
    ActivityTimeoutHandler, ActivityTimeoutKind, RefreshHandler, RefreshResult, RefreshType,
    TokenSnapshot,
};
pub use keys::{StorageKey, is_fragment_of, physical_key};
pub use settings::{DEFAULT_KEY_PREFIX, DEFAULT_MAX_LENGTH, SessionSettings, SettingsHandle};
pub use value::SessionValue;
