//! Nara Chess library - chess against an LLM coach
//!
//! The pupil plays White against an oracle that suggests moves with
//! commentary. Suggestions are untrusted: every one is validated against the
//! rules engine before it touches the game, and a retry-governed loop asks
//! again when the oracle is wrong or unreachable.
//!
//! # Architecture
//!
//! - **Game**: authoritative position and move history ([`GameSession`])
//! - **Acquisition**: the oracle's turn as a state machine ([`MoveAcquisitionLoop`])
//! - **Coach**: async controller driving the game, chat and oracle calls ([`Coach`])
//! - **Oracle**: wire types and the HTTP client ([`HttpOracle`])
//! - **Server**: the backend that turns requests into LLM prompts ([`router`], [`serve`])
//! - **Terminal**: a line-oriented client ([`run_terminal`])
//!
//! # Example
//!
//! ```no_run
//! use nara_chess::{GameSession, HumanMove};
//!
//! # fn example() -> anyhow::Result<()> {
//! let mut game = GameSession::new();
//! let record = game.apply_human_move(&"e2e4".parse::<HumanMove>()?)?;
//! assert_eq!(record.san(), "e4");
//! assert!(game.apply_oracle_move("e5").is_ok());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod acquisition;
mod chat;
mod coach;
mod config;
mod game;
mod oracle;
mod server;
mod terminal;

// Crate-level exports - Game state
pub use game::{
    AnnotationSet, Arrow, GameOutcome, GameSession, HumanMove, MoveError, MoveErrorKind, MoveRecord,
    Side, TurnOwner,
};

// Crate-level exports - Chat
pub use chat::{ChatEntry, ChatLog, ChatRole, chat_request};

// Crate-level exports - Oracle acquisition
pub use acquisition::{
    AcquisitionAttempt, AcquisitionFailure, AcquisitionState, AttemptOutcome, DEFAULT_CHAT_WINDOW,
    MAX_RETRIES, MoveAcquisitionLoop, RETRY_DELAY, ResponseOutcome, RetryPolicy,
    TRANSITION_LOG_LIMIT,
};

// Crate-level exports - Controller
pub use coach::{Coach, CoachCommand, CoachEvent, CoachSettings};

// Crate-level exports - Oracle client
pub use oracle::{
    ChatReply, ChatRequest, GameStateSnapshot, HttpOracle, MoveRequest, MoveSuggestion, Oracle,
    OracleError, OracleErrorKind,
};

// Crate-level exports - Backend
pub use server::{
    ApiError, AppState, CompletionBackend, LlmClient, LlmConfig, LlmError, LlmProvider, Sides,
    format_chat_history, infer_sides, router, serve, strip_code_fence,
};

// Crate-level exports - Configuration
pub use config::{ClientConfig, Config, ConfigError, ServerConfig};

// Crate-level exports - Terminal client
pub use terminal::{Input, parse_input, run_terminal};
