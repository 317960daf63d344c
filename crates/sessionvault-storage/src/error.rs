//! Error types for session storage operations.
//!
//! Absence of a key is never an error: every backend reports it as
//! `Ok(None)`. Errors cover backend unavailability, failed writes, invalid
//! values and configuration mistakes.

use std::fmt;

/// Error type surfaced by injected storage adapters.
pub type AdapterError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur during session storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A blocking helper was used against a backend without a sync path.
    #[error("Active storage is async-only. Use the async helpers.")]
    AsyncOnly,

    /// The backend (or its injected capability) is not usable.
    #[error("Storage unavailable: {message}")]
    Unavailable {
        /// Description of what is missing or not ready.
        message: String,
    },

    /// The underlying store rejected a write or delete.
    #[error("Write to {backend} storage failed")]
    WriteFailed {
        /// Backend name for logging.
        backend: &'static str,
        /// The adapter error that caused the failure.
        #[source]
        source: AdapterError,
    },

    /// The underlying store rejected a read, on a backend whose policy is
    /// to propagate read failures rather than degrade to absence.
    #[error("Read from {backend} storage failed")]
    ReadFailed {
        /// Backend name for logging.
        backend: &'static str,
        /// The adapter error that caused the failure.
        #[source]
        source: AdapterError,
    },

    /// The value cannot be stored by this backend.
    #[error("Invalid value: {message}")]
    InvalidValue {
        /// Description of why the value was rejected.
        message: String,
    },

    /// The caller's configuration is inconsistent or incomplete.
    #[error("{message}")]
    Configuration {
        /// Descriptive message, surfaced verbatim.
        message: String,
    },
}

impl StorageError {
    /// Creates a new `Unavailable` error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a new `WriteFailed` error.
    #[must_use]
    pub fn write_failed(backend: &'static str, source: AdapterError) -> Self {
        Self::WriteFailed { backend, source }
    }

    /// Creates a new `ReadFailed` error.
    #[must_use]
    pub fn read_failed(backend: &'static str, source: AdapterError) -> Self {
        Self::ReadFailed { backend, source }
    }

    /// Creates a new `InvalidValue` error.
    #[must_use]
    pub fn invalid_value(message: impl Into<String>) -> Self {
        Self::InvalidValue {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Activity clock updated without a registered session manager.
    #[must_use]
    pub fn session_manager_not_found() -> Self {
        Self::configuration("Session manager not found")
    }

    /// Activity clock updated without a configured timeout.
    #[must_use]
    pub fn no_activity_timeout() -> Self {
        Self::configuration("No activity timeout minutes set")
    }

    /// Pre-warning configured at or past the timeout itself.
    #[must_use]
    pub fn pre_warning_not_before_timeout(pre_warning: u64, timeout: u64) -> Self {
        Self::configuration(format!(
            "Activity pre-warning ({pre_warning} min) must be strictly less than the timeout ({timeout} min)"
        ))
    }

    /// Returns `true` if this is the async-only facade error.
    #[must_use]
    pub fn is_async_only(&self) -> bool {
        matches!(self, Self::AsyncOnly)
    }

    /// Returns `true` if the backend was unavailable.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Returns `true` for configuration mistakes.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    /// Returns the error category for logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::AsyncOnly | Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Unavailable { .. } => ErrorCategory::Unavailable,
            Self::WriteFailed { .. } | Self::ReadFailed { .. } => ErrorCategory::Backend,
            Self::InvalidValue { .. } => ErrorCategory::Validation,
        }
    }
}

/// Categories of storage errors for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Caller configuration mistake.
    Configuration,
    /// Backend or capability not usable.
    Unavailable,
    /// The physical store failed an operation.
    Backend,
    /// The value was rejected.
    Validation,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::Unavailable => write!(f, "unavailable"),
            Self::Backend => write!(f, "backend"),
            Self::Validation => write!(f, "validation"),
        }
    }
}
