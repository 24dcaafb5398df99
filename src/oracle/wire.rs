//! Request and response bodies exchanged with the coach backend.

use serde::{Deserialize, Serialize};

use crate::chat::ChatEntry;
use crate::game::{Arrow, Side};

/// Request for a move suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MoveRequest {
    /// Moves so far in SAN.
    #[serde(default)]
    pub move_history: Vec<String>,
    /// Current position.
    #[serde(default)]
    pub fen: String,
    /// The most recently rejected suggestion for this turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrong_move: Option<String>,
    /// Every suggestion rejected so far in this turn.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected_moves: Vec<String>,
    /// Recent conversation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chat_history: Vec<ChatEntry>,
}

impl MoveRequest {
    /// Rejected moves with blanks removed, most recent last, no duplicates.
    pub fn all_rejected(&self) -> Vec<String> {
        let mut moves: Vec<String> = Vec::new();
        let candidates = self.rejected_moves.iter().chain(self.wrong_move.iter());
        for m in candidates {
            let m = m.trim();
            if !m.is_empty() && !moves.iter().any(|seen| seen == m) {
                moves.push(m.to_string());
            }
        }
        moves
    }
}

/// The oracle's move, commentary and arrows.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MoveSuggestion {
    /// Coaching commentary.
    #[serde(default)]
    pub comment: String,
    /// Suggested move in SAN.
    #[serde(rename = "move", default)]
    pub san: String,
    /// Arrows to draw.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrows: Option<Vec<Arrow>>,
    /// Short description of the game.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Position and history sent alongside a chat request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GameStateSnapshot {
    /// Moves so far in SAN.
    #[serde(default)]
    pub move_history: Vec<String>,
    /// Current position.
    #[serde(default)]
    pub fen: String,
}

/// A chat turn sent to the coach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChatRequest {
    /// Recent conversation, newest last.
    #[serde(default)]
    pub message_history: Vec<ChatEntry>,
    /// Current game.
    pub game_state: GameStateSnapshot,
    /// Colour the pupil plays.
    pub player_side: Side,
}

/// The coach's chat reply.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChatReply {
    /// Reply text.
    #[serde(default)]
    pub response: String,
    /// Arrows illustrating the reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrows: Option<Vec<Arrow>>,
}
