//! Move rejection errors.

use derive_more::{Display, Error};
use tracing::{debug, instrument};

/// Why a candidate move was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum MoveErrorKind {
    /// The submitting side does not own the turn.
    #[display("not your turn")]
    NotYourTurn,
    /// The candidate could not be parsed (bad square, bad SAN, empty string).
    #[display("malformed move")]
    Malformed,
    /// The candidate parsed but is not legal in the current position.
    #[display("illegal move")]
    Illegal,
    /// The game has already ended.
    #[display("game is over")]
    GameOver,
}

/// A rejected move proposal.
///
/// Carries the offending candidate so the acquisition loop can feed it back
/// into the next oracle request.
#[derive(Debug, Clone, Display, Error)]
#[display("Move error: {} '{}': {} at {}:{}", kind, candidate, message, file, line)]
pub struct MoveError {
    /// Rejection category.
    pub kind: MoveErrorKind,
    /// The move as it was proposed.
    pub candidate: String,
    /// Detail from the rules engine.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl MoveError {
    /// Creates a new move error with caller location tracking.
    #[track_caller]
    #[instrument(skip(candidate, message))]
    pub fn new(
        kind: MoveErrorKind,
        candidate: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let loc = std::panic::Location::caller();
        let candidate = candidate.into();
        let message = message.into();
        debug!(kind = %kind, candidate = %candidate, message = %message, "Move rejected");
        Self {
            kind,
            candidate,
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
