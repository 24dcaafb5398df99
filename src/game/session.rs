//! The canonical game state and its two legality-checked transitions.

use shakmaty::fen::Fen;
use shakmaty::san::SanPlus;
use shakmaty::{CastlingMode, Chess, EnPassantMode, Move, Position};
use std::str::FromStr;
use tracing::{debug, info, instrument, warn};

use super::error::{MoveError, MoveErrorKind};
use super::types::{GameOutcome, HumanMove, MoveRecord, Side, TurnOwner};

/// Single source of truth for one game.
///
/// All mutation funnels through [`GameSession::apply_human_move`] and
/// [`GameSession::apply_oracle_move`]; both leave the session untouched on
/// rejection. The human plays White, so the human owns the turn exactly when
/// the history length is even.
#[derive(Debug, Clone)]
pub struct GameSession {
    generation: u64,
    position: Chess,
    fen: String,
    history: Vec<MoveRecord>,
    turn_owner: TurnOwner,
}

impl Default for GameSession {
    fn default() -> Self {
        Self::new()
    }
}

impl GameSession {
    /// Creates a session at the standard starting position.
    #[instrument]
    pub fn new() -> Self {
        let position = Chess::default();
        let fen = fen_of(&position);
        info!(fen = %fen, "Creating game session");
        Self {
            generation: 0,
            position,
            fen,
            history: Vec::new(),
            turn_owner: TurnOwner::Human,
        }
    }

    /// Replaces this session with a fresh game and bumps the generation.
    ///
    /// Responses tagged with an older generation no longer apply.
    #[instrument(skip(self), fields(generation = self.generation))]
    pub fn reset(&mut self) {
        let generation = self.generation + 1;
        *self = Self {
            generation,
            ..Self::new()
        };
        info!(generation, "Game session reset");
    }

    /// Identity of this game; changes on every reset.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Current position as FEN.
    pub fn fen(&self) -> &str {
        &self.fen
    }

    /// Accepted plies in order.
    pub fn history(&self) -> &[MoveRecord] {
        &self.history
    }

    /// History as SAN strings, the form sent to the oracle.
    pub fn san_history(&self) -> Vec<String> {
        self.history.iter().map(|r| r.san().clone()).collect()
    }

    /// Who may submit the next move.
    pub fn turn_owner(&self) -> TurnOwner {
        self.turn_owner
    }

    /// The colour the human plays.
    pub fn human_side(&self) -> Side {
        Side::White
    }

    /// The colour to move in the current position.
    pub fn side_to_move(&self) -> Side {
        self.position.turn().into()
    }

    /// How the game ended, if it has.
    pub fn outcome(&self) -> Option<GameOutcome> {
        if self.position.is_checkmate() {
            Some(GameOutcome::Checkmate {
                winner: self.side_to_move().opposite(),
            })
        } else if self.position.is_stalemate() {
            Some(GameOutcome::Stalemate)
        } else if self.position.is_insufficient_material() {
            Some(GameOutcome::InsufficientMaterial)
        } else {
            None
        }
    }

    /// Whether the game has ended.
    pub fn is_over(&self) -> bool {
        self.outcome().is_some()
    }

    /// Applies a move entered at the board.
    ///
    /// # Errors
    ///
    /// Returns [`MoveError`] if it is not the human's turn, the game is over,
    /// or the candidate is malformed or illegal. State is unchanged on error.
    #[instrument(
        skip(self, candidate),
        fields(generation = self.generation, candidate = %candidate)
    )]
    pub fn apply_human_move(&mut self, candidate: &HumanMove) -> Result<MoveRecord, MoveError> {
        self.check_turn(TurnOwner::Human, &candidate.to_string())?;

        let uci = candidate.to_uci()?;
        let m = uci.to_move(&self.position).map_err(|e| {
            MoveError::new(MoveErrorKind::Illegal, candidate.to_string(), e.to_string())
        })?;

        Ok(self.commit(m, TurnOwner::Human))
    }

    /// Applies a move suggested by the oracle in SAN.
    ///
    /// # Errors
    ///
    /// Returns [`MoveError`] carrying the offending string if it is not the
    /// oracle's turn, or the SAN is unparseable or illegal here. Rejection
    /// depends only on the position and the move, so resubmitting the same
    /// bad move fails the same way.
    #[instrument(skip(self), fields(generation = self.generation))]
    pub fn apply_oracle_move(&mut self, san: &str) -> Result<MoveRecord, MoveError> {
        let candidate = san.trim();
        self.check_turn(TurnOwner::Oracle, candidate)?;

        if candidate.is_empty() {
            return Err(MoveError::new(MoveErrorKind::Malformed, candidate, "empty move"));
        }

        let parsed = SanPlus::from_str(candidate)
            .map_err(|e| MoveError::new(MoveErrorKind::Malformed, candidate, e.to_string()))?;
        let m = parsed
            .san
            .to_move(&self.position)
            .map_err(|e| MoveError::new(MoveErrorKind::Illegal, candidate, e.to_string()))?;

        Ok(self.commit(m, TurnOwner::Oracle))
    }

    fn check_turn(&self, submitter: TurnOwner, candidate: &str) -> Result<(), MoveError> {
        if self.turn_owner != submitter {
            warn!(submitter = %submitter, owner = %self.turn_owner, "Move submitted out of turn");
            return Err(MoveError::new(
                MoveErrorKind::NotYourTurn,
                candidate,
                format!("waiting for {}", self.turn_owner),
            ));
        }
        if let Some(outcome) = self.outcome() {
            return Err(MoveError::new(MoveErrorKind::GameOver, candidate, outcome.to_string()));
        }
        Ok(())
    }

    fn commit(&mut self, m: Move, mover: TurnOwner) -> MoveRecord {
        let uci = m.to_uci(CastlingMode::Standard).to_string();
        let mut next = self.position.clone();
        let san = SanPlus::from_move_and_play_unchecked(&mut next, &m).to_string();

        self.position = next;
        self.fen = fen_of(&self.position);
        let record = MoveRecord::new(san, uci, mover);
        self.history.push(record.clone());
        self.turn_owner = mover.opponent();

        debug!(
            san = %record.san(),
            ply = self.history.len(),
            fen = %self.fen,
            next = %self.turn_owner,
            "Move committed"
        );
        record
    }
}

fn fen_of(position: &Chess) -> String {
    Fen::from_position(position.clone(), EnPassantMode::Legal).to_string()
}
