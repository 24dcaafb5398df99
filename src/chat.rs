//! Conversation between the pupil and the coach.

use derive_getters::Getters;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::game::GameSession;
use crate::oracle::{ChatRequest, GameStateSnapshot};

/// Author of a chat entry.
///
/// Wire names follow the LLM convention: `user` for the pupil, `model` for the coach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum ChatRole {
    /// The pupil.
    #[serde(rename = "user")]
    User,
    /// The coach.
    #[serde(rename = "model", alias = "coach")]
    Coach,
}

/// One chat message.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct ChatEntry {
    /// Message text.
    content: String,
    /// Who wrote it.
    role: ChatRole,
}

impl ChatEntry {
    /// A message from the pupil.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            role: ChatRole::User,
        }
    }

    /// A message from the coach.
    pub fn coach(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            role: ChatRole::Coach,
        }
    }
}

/// Ordered chat history. Persists across moves and resets.
#[derive(Debug, Clone, Default)]
pub struct ChatLog {
    entries: Vec<ChatEntry>,
}

impl ChatLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn push(&mut self, entry: ChatEntry) {
        debug!(role = %entry.role, len = self.entries.len() + 1, "Chat entry appended");
        self.entries.push(entry);
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    /// The most recent `size` entries, oldest first.
    pub fn window(&self, size: usize) -> &[ChatEntry] {
        let start = self.entries.len().saturating_sub(size);
        &self.entries[start..]
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builds the chat request for the current log and game.
#[instrument(skip(log, session), fields(generation = session.generation(), log_len = log.len()))]
pub fn chat_request(log: &ChatLog, session: &GameSession, window: usize) -> ChatRequest {
    ChatRequest {
        message_history: log.window(window).to_vec(),
        game_state: GameStateSnapshot {
            move_history: session.san_history(),
            fen: session.fen().to_string(),
        },
        player_side: session.human_side(),
    }
}
