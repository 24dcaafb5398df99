//! Retry-governed acquisition of the oracle's move.
//!
//! The loop is a plain state machine with no I/O. A driver (see
//! [`crate::Coach`]) dispatches the attempts it hands out, feeds responses back
//! through [`MoveAcquisitionLoop::handle_response`], and honours the retry
//! delays it asks for.
//!
//! ```text
//! Idle ──begin_turn──▶ AwaitingResponse ──response──▶ ValidatingMove ──legal──▶ Idle
//!                            ▲                              │
//!                            │ resume (after delay)         │ illegal / failed
//!                            └────────── Retrying ◀─────────┘
//!                                           │ attempts == max
//!                                           ▼
//!                 manual_retry ◀──────── Failed
//! ```

use derive_getters::Getters;
use derive_more::Display;
use derive_new::new;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::chat::ChatLog;
use crate::game::{GameSession, MoveRecord, TurnOwner};
use crate::oracle::{MoveRequest, MoveSuggestion, OracleError, OracleErrorKind};

/// Failed attempts allowed per oracle turn before giving up.
pub const MAX_RETRIES: u32 = 3;

/// Fixed pause between a failed attempt and the next one.
pub const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Chat entries sent along with a move request.
pub const DEFAULT_CHAT_WINDOW: usize = 10;

/// Undrained transitions kept before the oldest are dropped.
pub const TRANSITION_LOG_LIMIT: usize = 64;

/// Where the loop is in resolving the oracle's turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
pub enum AcquisitionState {
    /// Nothing to do: the human owns the turn, or no human move yet.
    Idle,
    /// One request is in flight.
    AwaitingResponse,
    /// A response arrived and is being checked against the rules.
    ValidatingMove,
    /// The last attempt failed; the next one starts after the delay.
    Retrying,
    /// Attempts exhausted; waiting for a manual retry.
    Failed,
}

/// Attempt ceiling and backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Getters, new)]
pub struct RetryPolicy {
    /// Failed attempts allowed per turn.
    max_retries: u32,
    /// Pause between attempts.
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(MAX_RETRIES, RETRY_DELAY)
    }
}

/// How a single attempt ended.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum AttemptOutcome {
    /// No usable response yet.
    #[display("pending")]
    Pending,
    /// The suggestion was applied.
    #[display("accepted {}", _0)]
    Accepted(String),
    /// The attempt counted as a failure.
    #[display("{}", _0)]
    Failed(AcquisitionFailure),
}

/// One request to the oracle for the current turn.
#[derive(Debug, Clone, Getters)]
pub struct AcquisitionAttempt {
    /// Session generation the attempt belongs to.
    generation: u64,
    /// 1-based attempt number within the turn.
    attempt_number: u32,
    /// Payload to send.
    request: MoveRequest,
    /// Result, once the response has been handled.
    outcome: AttemptOutcome,
}

/// Why an attempt, or a whole turn, failed.
///
/// `Display` renders the message shown to the pupil.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum AcquisitionFailure {
    /// The oracle proposed a move the rules engine refused.
    #[display("Coach suggested an illegal move ({}), asking again", san)]
    IllegalMove {
        /// The refused suggestion.
        san: String,
    },
    /// The oracle answered without a move.
    #[display("Coach answered without a move, asking again")]
    EmptyMove,
    /// Network failure, timeout, bad status or unreadable response.
    #[display("Coach is unreachable or timed out ({}), retrying", detail)]
    Unreachable {
        /// Failure category.
        detail: String,
    },
    /// The backend is misconfigured; no automatic retry.
    #[display("Coach service is unavailable. Press retry to ask again")]
    Unavailable,
    /// Every attempt failed.
    #[display("Coach failed {} times in a row. Press retry to ask again", attempts)]
    Exhausted {
        /// Attempts made.
        attempts: u32,
    },
}

/// What the driver must do after a response has been handled.
#[derive(Debug, Clone)]
pub enum ResponseOutcome {
    /// The response belonged to an older game or attempt and was dropped.
    Stale,
    /// The move was applied; the human owns the turn again.
    Accepted {
        /// The applied ply.
        record: MoveRecord,
        /// The full suggestion, for commentary and arrows.
        suggestion: MoveSuggestion,
    },
    /// Wait `delay`, then call [`MoveAcquisitionLoop::resume`].
    RetryAfter {
        /// Backoff to honour.
        delay: Duration,
        /// What went wrong.
        failure: AcquisitionFailure,
    },
    /// The loop is in `Failed`; only a manual retry continues.
    Failed(AcquisitionFailure),
}

/// Drives the oracle's turn to an applied move or a user-actionable failure.
#[derive(Debug, Clone)]
pub struct MoveAcquisitionLoop {
    policy: RetryPolicy,
    chat_window: usize,
    state: AcquisitionState,
    failed_attempts: u32,
    attempt_number: u32,
    generation: u64,
    rejected: Vec<String>,
    last_failure: Option<AcquisitionFailure>,
    attempts: Vec<AcquisitionAttempt>,
    transitions: VecDeque<AcquisitionState>,
}

impl Default for MoveAcquisitionLoop {
    fn default() -> Self {
        Self::new(RetryPolicy::default(), DEFAULT_CHAT_WINDOW)
    }
}

impl MoveAcquisitionLoop {
    /// Creates an idle loop.
    #[instrument]
    pub fn new(policy: RetryPolicy, chat_window: usize) -> Self {
        debug!("Creating move acquisition loop");
        Self {
            policy,
            chat_window,
            state: AcquisitionState::Idle,
            failed_attempts: 0,
            attempt_number: 0,
            generation: 0,
            rejected: Vec::new(),
            last_failure: None,
            attempts: Vec::new(),
            transitions: VecDeque::new(),
        }
    }

    /// Current state.
    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    /// Consecutive failed attempts in this turn.
    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    /// Suggestions rejected so far in this turn, most recent last.
    pub fn rejected(&self) -> &[String] {
        &self.rejected
    }

    /// The retry policy in force.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// The most recent failure, if the turn is not yet resolved.
    pub fn last_failure(&self) -> Option<&AcquisitionFailure> {
        self.last_failure.as_ref()
    }

    /// Message for the pupil, or `None` when nothing is wrong.
    pub fn status_message(&self) -> Option<String> {
        match self.state {
            AcquisitionState::Retrying | AcquisitionState::Failed => {
                self.last_failure.as_ref().map(ToString::to_string)
            }
            _ => None,
        }
    }

    /// Attempts of the current (or last resolved) turn, with their outcomes.
    ///
    /// Emptied when the next turn begins or the loop is reset.
    pub fn attempts(&self) -> &[AcquisitionAttempt] {
        &self.attempts
    }

    /// Drains the states entered since the last call, in order.
    ///
    /// At most [`TRANSITION_LOG_LIMIT`] are kept between calls; older ones are dropped.
    pub fn take_transitions(&mut self) -> Vec<AcquisitionState> {
        self.transitions.drain(..).collect()
    }

    /// Starts the oracle's turn if one is due.
    ///
    /// Returns the first attempt to dispatch, or `None` when the human owns the
    /// turn, no human move has been made, the game is over, or a turn is
    /// already being resolved.
    #[instrument(skip_all, fields(state = %self.state, generation = session.generation()))]
    pub fn begin_turn(
        &mut self,
        session: &GameSession,
        chat: &ChatLog,
    ) -> Option<AcquisitionAttempt> {
        if self.state != AcquisitionState::Idle {
            debug!("Acquisition already in progress");
            return None;
        }
        if session.turn_owner() != TurnOwner::Oracle
            || session.history().is_empty()
            || session.is_over()
        {
            debug!(
                owner = %session.turn_owner(),
                plies = session.history().len(),
                "No oracle turn due"
            );
            return None;
        }

        info!(plies = session.history().len(), "Oracle turn started");
        self.generation = session.generation();
        self.failed_attempts = 0;
        self.attempt_number = 0;
        self.rejected.clear();
        self.last_failure = None;
        self.attempts.clear();
        Some(self.next_attempt(session, chat))
    }

    /// Handles the oracle's answer to attempt `attempt_number` of `generation`.
    ///
    /// Applies a usable suggestion through [`GameSession::apply_oracle_move`];
    /// anything else counts as a failed attempt.
    #[instrument(skip(self, session, result), fields(state = %self.state))]
    pub fn handle_response(
        &mut self,
        session: &mut GameSession,
        generation: u64,
        attempt_number: u32,
        result: Result<MoveSuggestion, OracleError>,
    ) -> ResponseOutcome {
        if self.state != AcquisitionState::AwaitingResponse
            || generation != session.generation()
            || generation != self.generation
            || attempt_number != self.attempt_number
        {
            warn!(
                current_generation = session.generation(),
                current_attempt = self.attempt_number,
                "Discarding stale oracle response"
            );
            return ResponseOutcome::Stale;
        }

        self.transition(AcquisitionState::ValidatingMove);

        let suggestion = match result {
            Ok(s) => s,
            Err(e) if !e.is_retryable() => {
                warn!(error = %e, "Oracle unavailable, not retrying");
                self.last_failure = Some(AcquisitionFailure::Unavailable);
                self.record_outcome(AttemptOutcome::Failed(AcquisitionFailure::Unavailable));
                self.transition(AcquisitionState::Failed);
                return ResponseOutcome::Failed(AcquisitionFailure::Unavailable);
            }
            Err(e) => {
                let detail = match e.kind {
                    OracleErrorKind::Timeout => "timed out".to_string(),
                    kind => kind.to_string(),
                };
                return self.fail_attempt(AcquisitionFailure::Unreachable { detail });
            }
        };

        if suggestion.san.trim().is_empty() {
            return self.fail_attempt(AcquisitionFailure::EmptyMove);
        }

        match session.apply_oracle_move(&suggestion.san) {
            Ok(record) => {
                info!(san = %record.san(), attempt = attempt_number, "Oracle move accepted");
                self.failed_attempts = 0;
                self.rejected.clear();
                self.last_failure = None;
                self.record_outcome(AttemptOutcome::Accepted(record.san().to_string()));
                self.transition(AcquisitionState::Idle);
                ResponseOutcome::Accepted { record, suggestion }
            }
            Err(e) => {
                let san = suggestion.san.trim().to_string();
                warn!(san = %san, error = %e, "Oracle suggested an illegal move");
                self.rejected.retain(|m| *m != san);
                self.rejected.push(san.clone());
                self.fail_attempt(AcquisitionFailure::IllegalMove { san })
            }
        }
    }

    /// Leaves `Retrying` once the delay has elapsed.
    ///
    /// Returns the next attempt, carrying the rejected moves, or `None` if the
    /// loop moved on (reset, new game) in the meantime.
    #[instrument(skip(self, session, chat), fields(state = %self.state))]
    pub fn resume(
        &mut self,
        session: &GameSession,
        chat: &ChatLog,
        generation: u64,
    ) -> Option<AcquisitionAttempt> {
        if self.state != AcquisitionState::Retrying
            || generation != self.generation
            || generation != session.generation()
        {
            debug!("Retry timer no longer relevant");
            return None;
        }
        Some(self.next_attempt(session, chat))
    }

    /// The only way out of `Failed`: resets the attempt count and asks again.
    #[instrument(skip_all, fields(state = %self.state))]
    pub fn manual_retry(
        &mut self,
        session: &GameSession,
        chat: &ChatLog,
    ) -> Option<AcquisitionAttempt> {
        if self.state != AcquisitionState::Failed {
            debug!("Manual retry ignored outside Failed");
            return None;
        }
        info!(rejected = self.rejected.len(), "Manual retry requested");
        self.failed_attempts = 0;
        self.last_failure = None;
        Some(self.next_attempt(session, chat))
    }

    /// Returns to `Idle`, forgetting the current turn.
    #[instrument(skip(self), fields(state = %self.state))]
    pub fn reset(&mut self) {
        self.failed_attempts = 0;
        self.attempt_number = 0;
        self.rejected.clear();
        self.last_failure = None;
        self.attempts.clear();
        if self.state != AcquisitionState::Idle {
            self.transition(AcquisitionState::Idle);
        }
    }

    fn fail_attempt(&mut self, failure: AcquisitionFailure) -> ResponseOutcome {
        self.record_outcome(AttemptOutcome::Failed(failure.clone()));
        self.failed_attempts += 1;
        self.transition(AcquisitionState::Retrying);

        if self.failed_attempts >= self.policy.max_retries {
            let exhausted = AcquisitionFailure::Exhausted {
                attempts: self.failed_attempts,
            };
            warn!(attempts = self.failed_attempts, last = %failure, "Oracle attempts exhausted");
            self.last_failure = Some(exhausted.clone());
            self.transition(AcquisitionState::Failed);
            return ResponseOutcome::Failed(exhausted);
        }

        debug!(
            attempts = self.failed_attempts,
            delay_ms = self.policy.delay.as_millis() as u64,
            "Scheduling retry"
        );
        self.last_failure = Some(failure.clone());
        ResponseOutcome::RetryAfter {
            delay: self.policy.delay,
            failure,
        }
    }

    fn next_attempt(&mut self, session: &GameSession, chat: &ChatLog) -> AcquisitionAttempt {
        self.attempt_number += 1;
        self.transition(AcquisitionState::AwaitingResponse);

        let request = MoveRequest {
            move_history: session.san_history(),
            fen: session.fen().to_string(),
            wrong_move: self.rejected.last().cloned(),
            rejected_moves: self.rejected.clone(),
            chat_history: chat.window(self.chat_window).to_vec(),
        };
        debug!(attempt = self.attempt_number, wrong_move = ?request.wrong_move, "Attempt prepared");

        let attempt = AcquisitionAttempt {
            generation: self.generation,
            attempt_number: self.attempt_number,
            request,
            outcome: AttemptOutcome::Pending,
        };
        self.attempts.push(attempt.clone());
        attempt
    }

    fn record_outcome(&mut self, outcome: AttemptOutcome) {
        if let Some(attempt) = self.attempts.last_mut() {
            attempt.outcome = outcome;
        }
    }

    fn transition(&mut self, next: AcquisitionState) {
        debug!(from = %self.state, to = %next, "Acquisition transition");
        self.state = next;
        if self.transitions.len() == TRANSITION_LOG_LIMIT {
            self.transitions.pop_front();
        }
        self.transitions.push_back(next);
    }
}
