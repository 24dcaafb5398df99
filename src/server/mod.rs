//! Oracle proxy backend: turns move and chat requests into LLM prompts.

mod handlers;
mod llm_client;
mod prompt;
mod reply;

pub use handlers::ApiError;
pub use llm_client::{CompletionBackend, LlmClient, LlmConfig, LlmError, LlmProvider};
pub use prompt::{Sides, format_chat_history, infer_sides};
pub use reply::strip_code_fence;

use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};

use crate::config::{ConfigError, ServerConfig};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    backend: Option<Arc<dyn CompletionBackend>>,
    timeout: Duration,
    max_body_bytes: usize,
    allowed_origin: HeaderValue,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("backend", &self.backend.is_some())
            .field("timeout", &self.timeout)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("allowed_origin", &self.allowed_origin)
            .finish()
    }
}

impl AppState {
    /// Builds handler state from config. `backend` is `None` when no API key is available;
    /// oracle routes then answer 503.
    #[instrument(skip(config, backend), fields(has_backend = backend.is_some()))]
    pub fn from_config(
        config: &ServerConfig,
        backend: Option<Arc<dyn CompletionBackend>>,
    ) -> Result<Self, ConfigError> {
        let allowed_origin = HeaderValue::from_str(config.allowed_origin())
            .map_err(|e| ConfigError::new(format!("Invalid allowed_origin: {}", e)))?;
        Ok(Self {
            backend,
            timeout: config.oracle_timeout(),
            max_body_bytes: *config.max_body_bytes(),
            allowed_origin,
        })
    }
}

/// Routes for the coach backend.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/submitMove", post(handlers::submit_move))
        .route("/generateMove", post(handlers::submit_move))
        .route("/chatMessage", post(handlers::chat_message))
        .route("/health", get(handlers::health))
        .layer(middleware::from_fn_with_state(state.clone(), handlers::cors))
        .with_state(state)
}

/// Binds and serves until Ctrl-C.
#[instrument(skip(config), fields(host = %config.host(), port = config.port()))]
pub async fn serve(config: &ServerConfig) -> anyhow::Result<()> {
    let backend: Option<Arc<dyn CompletionBackend>> = match config.create_llm_config() {
        Ok(llm_config) => {
            info!(
                provider = %llm_config.provider(),
                model = llm_config.model(),
                "LLM backend ready"
            );
            Some(Arc::new(LlmClient::new(llm_config)))
        }
        Err(e) => {
            warn!(error = %e, "No LLM credentials; oracle routes will answer 503");
            None
        }
    };

    let app = router(AppState::from_config(config, backend)?);

    let addr = format!("{}:{}", config.host(), config.port());
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, origin = %config.allowed_origin(), "Coach server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for Ctrl-C");
            }
            info!("Shutting down");
        })
        .await?;

    Ok(())
}
