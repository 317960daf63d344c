//! Logical storage keys and physical slot naming.
//!
//! A logical key is the caller-facing name of one stored artifact
//! (`accessToken`, `state`, ...). Physically, a value occupies one or more
//! slots named `{prefix}{key}{index}` with a decimal index and no
//! separator, e.g. `kinde-accessToken0`. The naming must stay bit-exact so
//! sessions persisted by other SDKs remain readable.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Logical name of a stored session artifact.
///
/// The well-known variants cover the artifacts produced by an OAuth/OIDC
/// flow; `Custom` carries any caller-defined name for extension use.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StorageKey {
    AccessToken,
    IdToken,
    RefreshToken,
    State,
    Nonce,
    CodeVerifier,
    LastActivity,
    /// Caller-defined key. The string is used as the wire name verbatim.
    Custom(String),
}

impl StorageKey {
    /// The well-known logical keys, in a fixed order.
    ///
    /// Backends whose physical store cannot be enumerated (cookies,
    /// secure enclaves) destroy these on `destroy_session`.
    pub const WELL_KNOWN: [Self; 7] = [
        Self::AccessToken,
        Self::IdToken,
        Self::RefreshToken,
        Self::State,
        Self::Nonce,
        Self::CodeVerifier,
        Self::LastActivity,
    ];

    /// Returns the wire name used in physical slot naming.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::AccessToken => "accessToken",
            Self::IdToken => "idToken",
            Self::RefreshToken => "refreshToken",
            Self::State => "state",
            Self::Nonce => "nonce",
            Self::CodeVerifier => "codeVerifier",
            Self::LastActivity => "lastActivity",
            Self::Custom(name) => name,
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for StorageKey {
    fn from(name: &str) -> Self {
        match name {
            "accessToken" => Self::AccessToken,
            "idToken" => Self::IdToken,
            "refreshToken" => Self::RefreshToken,
            "state" => Self::State,
            "nonce" => Self::Nonce,
            "codeVerifier" => Self::CodeVerifier,
            "lastActivity" => Self::LastActivity,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl std::str::FromStr for StorageKey {
    type Err = std::convert::Infallible;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(name))
    }
}

impl From<String> for StorageKey {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<StorageKey> for String {
    fn from(key: StorageKey) -> Self {
        key.as_str().to_string()
    }
}

/// Builds the physical slot name for one fragment of a logical key.
///
/// Format is `{prefix}{key}{index}` with no separator before the decimal
/// index: prefix `kinde-`, key `accessToken`, index `0` yields
/// `kinde-accessToken0`.
#[must_use]
pub fn physical_key(prefix: &str, key: &StorageKey, index: usize) -> String {
    format!("{prefix}{key}{index}")
}

/// Returns `true` if `name` is a physical slot belonging to `key` under
/// `prefix`, i.e. `{prefix}{key}` followed by only decimal digits.
///
/// Used by removal paths that clean up by enumeration, so that a key like
/// `state` does not accidentally match slots of another key sharing its
/// spelling as a prefix.
#[must_use]
pub fn is_fragment_of(name: &str, prefix: &str, key: &StorageKey) -> bool {
    let Some(rest) = name.strip_prefix(prefix) else {
        return false;
    };
    let Some(index) = rest.strip_prefix(key.as_str()) else {
        return false;
    };
    !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit())
}
