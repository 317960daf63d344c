//! # sessionvault-kv
//!
//! Backend for edge key-value services (Cloudflare KV, Vercel KV and the
//! like) reached through a host-injected [`KvClient`]. These stores are
//! eventually consistent: a write may not be visible to the next read,
//! and per-fragment TTLs expire independently.
//!
//! Two disciplines deal with that:
//!
//! - **read-after-write verification** (advisory): after a write, up to
//!   `consistency_retries` read-back passes with growing backoff check
//!   that the written value is visible. A persistent mismatch is logged
//!   as a warning; the write still reports success and is never redone.
//! - **bounded read retries**: a read that finds nothing may retry with
//!   the same backoff, to tolerate replication lag right after a write
//!   elsewhere.
//!
//! Partial TTL expiry is handled by the join rule itself: a missing early
//! fragment makes the whole key read as absent instead of truncated.

mod client;
mod manager;

pub use client::KvClient;
pub use manager::{KvOptions, KvSessionManager};
