//! Tagged value variant accepted at the serialization boundary.
//!
//! Strings are stored verbatim and may be chunked across slots. Every
//! other variant is serialized once and written only to slot index 0,
//! never split. Reads always return the raw stored string; decoding and
//! typing are the caller's responsibility.

use serde_json::Value;

/// A value accepted by `set_session_item`.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionValue {
    /// Stored verbatim; chunked when longer than the fragment cap.
    Text(String),
    /// Stored as `"true"` / `"false"` in slot 0.
    Bool(bool),
    /// Stored via its `Display` form in slot 0.
    Number(f64),
    /// JSON-encoded into slot 0.
    Json(Value),
}

impl SessionValue {
    /// Returns `true` for the `Text` variant.
    ///
    /// Only text values participate in chunking; some backends (secure
    /// enclave storage) accept nothing else.
    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }

    /// Serializes the value to its stored string form.
    #[must_use]
    pub fn serialize(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => n.to_string(),
            Self::Json(v) => v.to_string(),
        }
    }
}

impl From<String> for SessionValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for SessionValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<bool> for SessionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for SessionValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<Value> for SessionValue {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}
