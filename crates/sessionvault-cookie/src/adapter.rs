//! The host-injected cookie seam.

use std::time::Duration;

use async_trait::async_trait;
use sessionvault_storage::AdapterError;

/// `SameSite` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

/// Attributes applied to every cookie written by the backend.
#[derive(Debug, Clone)]
pub struct CookieOptions {
    pub domain: Option<String>,
    pub path: String,
    pub max_age: Option<Duration>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            domain: None,
            path: "/".to_string(),
            max_age: None,
            secure: true,
            http_only: true,
            same_site: SameSite::Lax,
        }
    }
}

/// Host-supplied access to the request's cookies.
///
/// Implementations bind to whatever HTTP framework the host uses; the
/// backend only ever calls these three operations.
#[async_trait]
pub trait CookieAdapter: Send + Sync {
    /// Reads a cookie by name. Missing cookies are `Ok(None)`.
    async fn get(&self, name: &str) -> Result<Option<String>, AdapterError>;

    /// Writes a cookie.
    async fn set(
        &self,
        name: &str,
        value: &str,
        options: &CookieOptions,
    ) -> Result<(), AdapterError>;

    /// Deletes a cookie. Deleting an absent cookie is not an error.
    async fn delete(&self, name: &str, options: &CookieOptions) -> Result<(), AdapterError>;
}
