//! Oracle backed by the coach HTTP server.

use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::error::{OracleError, OracleErrorKind};
use super::wire::{ChatReply, ChatRequest, MoveRequest, MoveSuggestion};
use super::Oracle;

/// HTTP client for the coach backend.
#[derive(Debug, Clone)]
pub struct HttpOracle {
    base_url: String,
    client: reqwest::Client,
}

impl HttpOracle {
    /// Creates a client for the backend at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError`] if the HTTP client cannot be built.
    #[instrument(skip_all, fields(base_url = %base_url.as_ref()))]
    pub fn new(base_url: impl AsRef<str>, timeout: Duration) -> Result<Self, OracleError> {
        let base_url = base_url.as_ref().trim_end_matches('/').to_string();
        info!(timeout_secs = timeout.as_secs(), "Creating HTTP oracle");
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                let message = format!("Failed to build HTTP client: {}", e);
                OracleError::new(OracleErrorKind::Unreachable, message)
            })?;
        Ok(Self { base_url, client })
    }

    /// The backend base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, OracleError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "Posting to coach backend");

        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!(status = %status, body = %text.trim(), "Coach backend returned error");
            let kind = match status {
                StatusCode::SERVICE_UNAVAILABLE => OracleErrorKind::Unavailable,
                StatusCode::GATEWAY_TIMEOUT => OracleErrorKind::Timeout,
                other => OracleErrorKind::Status(other.as_u16()),
            };
            return Err(OracleError::new(kind, text.trim().to_string()));
        }

        serde_json::from_str(&text).map_err(|e| {
            OracleError::new(OracleErrorKind::Malformed, format!("Failed to parse response: {}", e))
        })
    }
}

#[async_trait::async_trait]
impl Oracle for HttpOracle {
    #[instrument(
        skip(self, request),
        fields(plies = request.move_history.len(), wrong_move = ?request.wrong_move)
    )]
    async fn suggest_move(&self, request: &MoveRequest) -> Result<MoveSuggestion, OracleError> {
        let suggestion: MoveSuggestion = self.post("/submitMove", request).await?;
        info!(san = %suggestion.san, "Received move suggestion");
        Ok(suggestion)
    }

    #[instrument(skip(self, request), fields(messages = request.message_history.len()))]
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, OracleError> {
        let reply: ChatReply = self.post("/chatMessage", request).await?;
        info!(length = reply.response.len(), "Received chat reply");
        Ok(reply)
    }
}
