//! Oracle failure taxonomy.

use derive_more::{Display, Error};
use tracing::{error, instrument};

/// Category of oracle failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum OracleErrorKind {
    /// Network failure before a response arrived.
    #[display("unreachable")]
    Unreachable,
    /// The request or the backend's LLM call timed out.
    #[display("timed out")]
    Timeout,
    /// The backend answered with an error status.
    #[display("backend error {}", _0)]
    Status(u16),
    /// The body was not the expected JSON.
    #[display("malformed response")]
    Malformed,
    /// The backend lacks credentials; retrying will not help.
    #[display("service unavailable")]
    Unavailable,
}

/// A failed oracle request.
#[derive(Debug, Clone, Display, Error)]
#[display("Oracle error ({}): {} at {}:{}", kind, message, file, line)]
pub struct OracleError {
    /// Failure category.
    pub kind: OracleErrorKind,
    /// Detail.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl OracleError {
    /// Creates a new oracle error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(kind: OracleErrorKind, message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        let message = message.into();
        error!(kind = %kind, error_message = %message, "Oracle error created");
        Self {
            kind,
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }

    /// Whether another attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind != OracleErrorKind::Unavailable
    }
}

impl From<reqwest::Error> for OracleError {
    #[track_caller]
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            OracleErrorKind::Timeout
        } else if err.is_decode() {
            OracleErrorKind::Malformed
        } else if let Some(status) = err.status() {
            OracleErrorKind::Status(status.as_u16())
        } else {
            OracleErrorKind::Unreachable
        };
        Self::new(kind, err.to_string())
    }
}
