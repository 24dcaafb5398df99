//! Chess game state: session, move descriptors, annotations.

mod error;
mod session;
mod types;

pub use error::{MoveError, MoveErrorKind};
pub use session::GameSession;
pub use types::{AnnotationSet, Arrow, GameOutcome, HumanMove, MoveRecord, Side, TurnOwner};
