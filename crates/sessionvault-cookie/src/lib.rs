//! # sessionvault-cookie
//!
//! Cookie backend. The physical store is the per-request cookie set,
//! reached through a host-injected [`CookieAdapter`]; this crate never
//! parses or emits `Set-Cookie` headers itself.
//!
//! Cookies have tight size limits, so the fragment cap defaults to
//! `min(settings.max_length, 3000)`. Reads are best-effort: a failing
//! adapter read is logged and degrades to "no session". Writes and
//! deletes propagate their failures so callers can abort instead of
//! proceeding with a half-written session.

mod adapter;
mod manager;

pub use adapter::{CookieAdapter, CookieOptions, SameSite};
pub use manager::{COOKIE_MAX_LENGTH, CookieSessionManager};
