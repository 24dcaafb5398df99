//! Text rendering of the board and controller events.

use shakmaty::fen::Fen;
use shakmaty::{File, Rank, Square};

use crate::acquisition::AcquisitionState;
use crate::chat::ChatRole;
use crate::coach::CoachEvent;
use crate::game::Arrow;

/// Draws the position of a FEN as an 8x8 grid, White at the bottom.
///
/// Returns `None` if the FEN does not parse.
pub fn board(fen: &str) -> Option<String> {
    let setup = fen.parse::<Fen>().ok()?.into_setup();

    let mut out = String::new();
    for rank in Rank::ALL.into_iter().rev() {
        out.push_str(&format!("{}", rank.char()));
        for file in File::ALL {
            let square = Square::from_coords(file, rank);
            out.push(' ');
            out.push(setup.board.piece_at(square).map_or('.', |piece| piece.char()));
        }
        out.push('\n');
    }
    out.push_str("  a b c d e f g h\n");
    Some(out)
}

/// Formats a move list as numbered pairs: `1. e4 e5 2. Nf3`.
pub fn move_list(history: &[String]) -> String {
    history
        .chunks(2)
        .enumerate()
        .map(|(i, pair)| format!("{}. {}", i + 1, pair.join(" ")))
        .collect::<Vec<_>>()
        .join(" ")
}

fn arrows(arrows: &[Arrow]) -> String {
    arrows.iter().map(Arrow::to_string).collect::<Vec<_>>().join(", ")
}

/// One line (or block) for the terminal, or `None` for events not worth printing.
pub fn event(event: &CoachEvent) -> Option<String> {
    match event {
        CoachEvent::PositionChanged { fen, history } => {
            let grid = board(fen).unwrap_or_else(|| format!("{}\n", fen));
            if history.is_empty() {
                Some(format!("\n{}New game. You play White.", grid))
            } else {
                Some(format!("\n{}{}", grid, move_list(history)))
            }
        }
        CoachEvent::HumanMoveRejected { candidate, reason } => {
            Some(format!("✗ {} refused ({})", candidate, reason))
        }
        CoachEvent::AcquisitionChanged(AcquisitionState::AwaitingResponse) => {
            Some("… coach is thinking".to_string())
        }
        CoachEvent::AcquisitionChanged(_) => None,
        CoachEvent::StatusChanged(Some(status)) => Some(format!("! {}", status)),
        CoachEvent::StatusChanged(None) => None,
        CoachEvent::ChatAppended(entry) => match entry.role() {
            ChatRole::Coach => Some(format!("Coach: {}", entry.content())),
            ChatRole::User => None,
        },
        CoachEvent::AnnotationsChanged(list) if list.is_empty() => None,
        CoachEvent::AnnotationsChanged(list) => Some(format!("Arrows: {}", arrows(list))),
        CoachEvent::TitleChanged(title) => Some(format!("== {} ==", title)),
        CoachEvent::GameOver(outcome) => {
            Some(format!("Game over: {}. Type /reset for a new game.", outcome))
        }
    }
}
