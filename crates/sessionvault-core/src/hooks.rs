//! Host-application callback types carried by the settings record.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Which stage of the idle-activity state machine fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityTimeoutKind {
    /// The configured pre-warning elapsed; the session is still intact.
    PreWarning,
    /// The idle timeout elapsed; the session is about to be destroyed.
    Timeout,
}

/// Best-effort snapshot of the token artifacts, read just before an idle
/// timeout destroys the session and handed to the timeout callback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSnapshot {
    pub access_token: Option<String>,
    pub id_token: Option<String>,
    pub refresh_token: Option<String>,
}

/// Callback invoked on activity pre-warning and timeout.
///
/// The snapshot is present only for [`ActivityTimeoutKind::Timeout`].
pub type ActivityTimeoutHandler =
    Arc<dyn Fn(ActivityTimeoutKind, Option<TokenSnapshot>) + Send + Sync>;

/// Which kind of refresh artifact the host's refresh hook should exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshType {
    RefreshToken,
    Cookie,
}

/// Outcome reported by the host's refresh hook.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshResult {
    pub success: bool,
    pub access_token: Option<String>,
    pub id_token: Option<String>,
    pub refresh_token: Option<String>,
}

/// Host-supplied token refresh hook. The refresh flow itself lives outside
/// this workspace; storage only carries the hook in settings.
pub type RefreshHandler = Arc<dyn Fn(RefreshType) -> RefreshResult + Send + Sync>;
