//! Parsing of terminal input lines.

use crate::coach::CoachCommand;
use crate::game::HumanMove;

/// One line typed by the pupil.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// A coordinate move such as `e2e4`.
    Move(HumanMove),
    /// `/chat <text>`.
    Chat(String),
    /// `/retry`.
    Retry,
    /// `/reset`.
    Reset,
    /// `/board`.
    Board,
    /// `/help`.
    Help,
    /// `/quit` or `/exit`.
    Quit,
    /// Blank line.
    Empty,
    /// Anything else; carries the offending text.
    Unknown(String),
}

impl Input {
    /// The controller command this input maps to, if any.
    pub fn command(&self) -> Option<CoachCommand> {
        match self {
            Input::Move(m) => Some(CoachCommand::HumanMove(m.clone())),
            Input::Chat(text) => Some(CoachCommand::Chat(text.clone())),
            Input::Retry => Some(CoachCommand::Retry),
            Input::Reset => Some(CoachCommand::Reset),
            Input::Quit => Some(CoachCommand::Shutdown),
            Input::Board | Input::Help | Input::Empty | Input::Unknown(_) => None,
        }
    }
}

/// Parses one line of input.
pub fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }

    if let Some(rest) = line.strip_prefix('/') {
        let (word, arg) = match rest.split_once(char::is_whitespace) {
            Some((word, arg)) => (word, arg.trim()),
            None => (rest, ""),
        };
        return match word.to_ascii_lowercase().as_str() {
            "chat" | "c" if !arg.is_empty() => Input::Chat(arg.to_string()),
            "retry" | "r" => Input::Retry,
            "reset" | "new" => Input::Reset,
            "board" | "b" => Input::Board,
            "help" | "h" | "?" => Input::Help,
            "quit" | "exit" | "q" => Input::Quit,
            _ => Input::Unknown(line.to_string()),
        };
    }

    match line.parse::<HumanMove>() {
        Ok(m) => Input::Move(m),
        Err(_) => Input::Unknown(line.to_string()),
    }
}

/// Help text for the prompt.
pub const HELP: &str = "\
Moves:    e2e4, e2 e4, e2-e4, e7e8q (promotion)
/chat <text>   talk to the coach
/retry         ask the coach again after a failure
/reset         start a new game
/board         redraw the board
/quit          leave";
