//! Core domain types for a coached chess game.

use derive_getters::Getters;
use derive_more::Display;
use derive_new::new;
use serde::{Deserialize, Serialize};
use shakmaty::{Role, Square, uci::UciMove};
use std::str::FromStr;
use tracing::{debug, warn};

use super::error::{MoveError, MoveErrorKind};

/// Which participant may submit the next move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnOwner {
    /// The pupil at the board.
    Human,
    /// The move-suggesting coach service.
    Oracle,
}

impl TurnOwner {
    /// Returns the other participant.
    pub fn opponent(self) -> Self {
        match self {
            TurnOwner::Human => TurnOwner::Oracle,
            TurnOwner::Oracle => TurnOwner::Human,
        }
    }
}

/// Board colour as exchanged on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Moves first.
    #[display("white")]
    White,
    /// Moves second.
    #[display("black")]
    Black,
}

impl Side {
    /// Returns the opposing colour.
    pub fn opposite(self) -> Self {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    /// Capitalised name used in prompts.
    pub fn title(self) -> &'static str {
        match self {
            Side::White => "White",
            Side::Black => "Black",
        }
    }
}

impl From<shakmaty::Color> for Side {
    fn from(color: shakmaty::Color) -> Self {
        match color {
            shakmaty::Color::White => Side::White,
            shakmaty::Color::Black => Side::Black,
        }
    }
}

/// A move proposed through the board UI: source, destination, optional promotion.
#[derive(Debug, Clone, PartialEq, Eq, Getters, new)]
pub struct HumanMove {
    /// Source square, e.g. `e2`.
    from: String,
    /// Destination square, e.g. `e4`.
    to: String,
    /// Promotion piece letter (`q`, `r`, `b`, `n`).
    promotion: Option<char>,
}

impl HumanMove {
    /// Converts the descriptor into a UCI move for the rules engine.
    pub(crate) fn to_uci(&self) -> Result<UciMove, MoveError> {
        let malformed =
            |message: String| MoveError::new(MoveErrorKind::Malformed, self.to_string(), message);
        let from = Square::from_str(&self.from)
            .map_err(|e| malformed(format!("bad source square: {}", e)))?;
        let to = Square::from_str(&self.to)
            .map_err(|e| malformed(format!("bad destination square: {}", e)))?;
        let promotion = match self.promotion {
            Some(c) => Some(
                Role::from_char(c.to_ascii_lowercase())
                    .ok_or_else(|| malformed(format!("bad promotion piece '{}'", c)))?,
            ),
            None => None,
        };
        Ok(UciMove::Normal { from, to, promotion })
    }
}

impl std::fmt::Display for HumanMove {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(p) = self.promotion {
            write!(f, "{}", p)?;
        }
        Ok(())
    }
}

impl FromStr for HumanMove {
    type Err = MoveError;

    /// Parses coordinate notation: `e2e4`, `e2 e4`, `e2-e4`, `e7e8q`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();

        if !(compact.len() == 4 || compact.len() == 5) || !compact.is_ascii() {
            return Err(MoveError::new(
                MoveErrorKind::Malformed,
                s,
                "expected coordinate notation like e2e4 or e7e8q",
            ));
        }

        let promotion = compact.chars().nth(4);
        Ok(Self::new(
            compact[0..2].to_string(),
            compact[2..4].to_string(),
            promotion,
        ))
    }
}

/// One accepted ply.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct MoveRecord {
    /// Move in Standard Algebraic Notation, with check suffix.
    san: String,
    /// Move in UCI coordinates.
    uci: String,
    /// Who submitted it.
    mover: TurnOwner,
}

impl MoveRecord {
    pub(crate) fn new(san: String, uci: String, mover: TurnOwner) -> Self {
        Self { san, uci, mover }
    }
}

/// A coaching arrow from one square to another.
///
/// Serialises as a two-element array, `["e2", "e4"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Arrow(pub String, pub String);

impl Arrow {
    /// Source square.
    pub fn from_square(&self) -> &str {
        &self.0
    }

    /// Destination square.
    pub fn to_square(&self) -> &str {
        &self.1
    }

    fn is_valid(&self) -> bool {
        Square::from_str(&self.0).is_ok() && Square::from_str(&self.1).is_ok() && self.0 != self.1
    }
}

impl std::fmt::Display for Arrow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}->{}", self.0, self.1)
    }
}

/// Arrows currently drawn on the board.
///
/// Replaced wholesale by oracle and chat responses, cleared by human moves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationSet {
    arrows: Vec<Arrow>,
}

impl AnnotationSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every arrow. Arrows naming unknown squares are dropped.
    pub fn replace(&mut self, arrows: Vec<Arrow>) {
        let before = arrows.len();
        self.arrows = arrows.into_iter().filter(Arrow::is_valid).collect();
        if self.arrows.len() != before {
            warn!(
                dropped = before - self.arrows.len(),
                "Discarded arrows with invalid squares"
            );
        }
        debug!(count = self.arrows.len(), "Annotations replaced");
    }

    /// Removes every arrow.
    pub fn clear(&mut self) {
        self.arrows.clear();
    }

    /// The arrows in display order.
    pub fn arrows(&self) -> &[Arrow] {
        &self.arrows
    }

    /// Whether nothing is drawn.
    pub fn is_empty(&self) -> bool {
        self.arrows.is_empty()
    }
}

/// How a finished game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum GameOutcome {
    /// The side to move is mated.
    #[display("checkmate, {} wins", winner)]
    Checkmate {
        /// The side delivering mate.
        winner: Side,
    },
    /// The side to move has no legal move and is not in check.
    #[display("stalemate")]
    Stalemate,
    /// Neither side can mate.
    #[display("draw by insufficient material")]
    InsufficientMaterial,
}
