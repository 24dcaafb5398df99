//! The move/commentary oracle as seen from the client.

mod error;
mod http_oracle;
mod wire;

pub use error::{OracleError, OracleErrorKind};
pub use http_oracle::HttpOracle;
pub use wire::{ChatReply, ChatRequest, GameStateSnapshot, MoveRequest, MoveSuggestion};

/// An untrusted, fallible source of move suggestions and chat replies.
#[async_trait::async_trait]
pub trait Oracle: Send + Sync {
    /// Asks for a move in the given position.
    async fn suggest_move(&self, request: &MoveRequest) -> Result<MoveSuggestion, OracleError>;

    /// Sends one conversational turn.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, OracleError>;
}
