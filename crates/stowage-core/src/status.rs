//! # Operation Status
//!
//! The outcome record for remote write/delete operations.

use serde::{Deserialize, Serialize};

/// The result of a remote operation: an HTTP status code plus an optional
/// message.
///
/// The message is populated only for failures. Success responses never carry
/// body text into `Status`, so logging a successful outcome cannot leak
/// response content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// Numeric HTTP response code.
    pub code: u16,
    /// Failure detail, absent on success.
    pub message: Option<String>,
}

impl Status {
    /// A successful outcome. Carries no message by construction.
    pub fn ok(code: u16) -> Self {
        Self {
            code,
            message: None,
        }
    }

    /// A failed outcome with its diagnostic message.
    pub fn failed(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }

    /// Whether the code is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.message {
            Some(msg) => write!(f, "{} ({msg})", self.code),
            None => write!(f, "{}", self.code),
        }
    }
}
