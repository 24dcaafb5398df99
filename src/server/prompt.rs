//! Prompt construction for move and chat requests.

use tracing::{debug, instrument};

use crate::chat::{ChatEntry, ChatRole};
use crate::game::Side;
use crate::oracle::{ChatRequest, MoveRequest};

/// Which side the oracle plays and which side the pupil plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sides {
    /// The oracle's colour.
    pub oracle: Side,
    /// The pupil's colour.
    pub pupil: Side,
}

/// Reads the side-to-move field of a FEN. The side to move is the oracle's.
///
/// Returns `None` when the field is missing or is neither `w` nor `b`.
#[instrument]
pub fn infer_sides(fen: &str) -> Option<Sides> {
    let oracle = match fen.split_whitespace().nth(1)? {
        "w" => Side::White,
        "b" => Side::Black,
        other => {
            debug!(field = other, "Unrecognised side-to-move field");
            return None;
        }
    };
    Some(Sides {
        oracle,
        pupil: oracle.opposite(),
    })
}

/// Sides for a chat, given the colour the pupil claims.
pub fn chat_sides(player_side: Side) -> Sides {
    Sides {
        oracle: player_side.opposite(),
        pupil: player_side,
    }
}

const MOVE_SYSTEM_PROMPT: &str = r#"You are a strong chess engine and a friendly coach playing an
instructive game against your pupil.

Pick the strongest move for your side, then coach. Point out concrete positional features such as
weak squares, piece activity, king safety and pawn structure. Explain the plan behind your move.
Mention good ideas or mistakes in the pupil's last move. Name the opening when it is a known one.
Keep the tone casual and direct.

Arrows are optional: at most three, only for future moves, threats or plans you have described in
the comment. Never draw an arrow for a move already played. Early in the game and in textbook
positions, return no arrows.

Say "I" for yourself and "you" for the pupil. Never say "we", "us" or "our".

Reply with one JSON object and nothing else:
{
  "comment": "1-3 sentences of coaching",
  "move": "your move in SAN, e.g. Nf3, O-O, e8=Q+",
  "arrows": [["e2", "e4"]],
  "title": "a short phrase describing the game"
}"#;

const CHAT_SYSTEM_PROMPT: &str = r#"You are a chess coach in an ongoing conversation with your pupil
about the game you are playing together.

Answer as the coach. Give insight, answer questions, or just chat; the conversation need not stay on
the game. Use plain English with concrete chess reasoning and refer to positional features and
classical ideas when they help.

Arrows are optional: at most three, only to illustrate ideas you describe or questions the pupil
asked. Never draw an arrow for a move already played.

Say "I" for yourself and "you" for the pupil. Never say "we" or "us".

Reply with one JSON object and nothing else:
{"response": "your reply", "arrows": [["e2", "e4"]]}"#;

/// System and user prompts for a move request.
#[instrument(skip(request), fields(plies = request.move_history.len()))]
pub fn move_prompt(request: &MoveRequest, sides: Sides) -> (String, String) {
    let mut user = format!(
        "You play {}. Your pupil plays {}. Your pupil just moved; it is your turn.\n\n\
         FEN: {}\nMove history: {}\n",
        sides.oracle.title(),
        sides.pupil.title(),
        request.fen,
        request.move_history.join(" "),
    );

    if !request.chat_history.is_empty() {
        user.push_str("\nRecent chat (most recent last):\n");
        user.push_str(&format_chat_history(&request.chat_history));
    }

    for rejected in request.all_rejected() {
        user.push_str(&format!("\n{} is an INVALID MOVE here. Do not play it.", rejected));
    }

    debug!(user_len = user.len(), "Built move prompt");
    (MOVE_SYSTEM_PROMPT.to_string(), user)
}

/// System and user prompts for a chat request.
#[instrument(skip(request), fields(messages = request.message_history.len()))]
pub fn chat_prompt(request: &ChatRequest) -> (String, String) {
    let sides = chat_sides(request.player_side);
    let user = format!(
        "You play {}. Your pupil plays {}.\n\n\
         FEN: {}\nMove history: {}\nChat history (most recent last):\n{}",
        sides.oracle.title(),
        sides.pupil.title(),
        request.game_state.fen,
        request.game_state.move_history.join(" "),
        format_chat_history(&request.message_history),
    );
    debug!(user_len = user.len(), "Built chat prompt");
    (CHAT_SYSTEM_PROMPT.to_string(), user)
}

/// Renders chat entries as `Pupil: ...` / `Coach: ...` lines.
pub fn format_chat_history(entries: &[ChatEntry]) -> String {
    entries
        .iter()
        .map(|entry| {
            let speaker = match entry.role() {
                ChatRole::User => "Pupil",
                ChatRole::Coach => "Coach",
            };
            format!("{}: {}\n", speaker, entry.content())
        })
        .collect()
}
