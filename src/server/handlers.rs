//! HTTP handlers for the coach backend.

use axum::{
    Json,
    body::Body,
    extract::{Request, State},
    http::{HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use derive_more::Display;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, instrument, warn};

use super::AppState;
use super::prompt::{chat_prompt, infer_sides, move_prompt};
use super::reply::parse_reply;
use crate::oracle::{ChatReply, ChatRequest, MoveRequest, MoveSuggestion};

/// Plain-text error response.
#[derive(Debug, Clone, Display)]
#[display("{}: {}", status, message)]
pub struct ApiError {
    status: StatusCode,
    message: &'static str,
}

impl ApiError {
    fn new(status: StatusCode, message: &'static str) -> Self {
        Self { status, message }
    }

    fn bad_request(message: &'static str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn internal(message: &'static str) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!(status = %self.status, message = self.message, "Request failed");
        (self.status, self.message).into_response()
    }
}

/// Reads a JSON body no larger than the configured limit.
async fn read_json<T: DeserializeOwned>(state: &AppState, body: Body) -> Result<T, ApiError> {
    let bytes = axum::body::to_bytes(body, state.max_body_bytes).await.map_err(|e| {
        debug!(error = %e, "Failed to read request body");
        ApiError::bad_request("Invalid JSON")
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        debug!(error = %e, "Failed to decode request body");
        ApiError::bad_request("Invalid JSON")
    })
}

/// Runs one completion under the configured deadline.
async fn complete(
    state: &AppState,
    system_prompt: &str,
    user_message: &str,
) -> Result<String, ApiError> {
    let backend = state.backend.as_ref().ok_or_else(|| {
        error!("No LLM backend configured");
        ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "Server configuration error")
    })?;

    match tokio::time::timeout(state.timeout, backend.complete(system_prompt, user_message)).await {
        Err(_) => {
            error!(timeout_secs = state.timeout.as_secs(), "LLM call timed out");
            Err(ApiError::new(StatusCode::GATEWAY_TIMEOUT, "Analysis request timed out"))
        }
        Ok(Err(e)) => {
            error!(error = %e, "LLM call failed");
            Err(ApiError::internal("Failed to get analysis"))
        }
        Ok(Ok(text)) => Ok(text),
    }
}

/// `POST /submitMove` and `POST /generateMove`.
#[instrument(skip_all)]
pub async fn submit_move(
    State(state): State<AppState>,
    body: Body,
) -> Result<Json<MoveSuggestion>, ApiError> {
    let request: MoveRequest = read_json(&state, body).await?;

    if request.fen.trim().is_empty() {
        return Err(ApiError::bad_request("Missing FEN"));
    }
    let sides = infer_sides(&request.fen).ok_or_else(|| ApiError::bad_request("Invalid FEN"))?;

    info!(
        plies = request.move_history.len(),
        oracle_side = %sides.oracle,
        rejected = request.all_rejected().len(),
        "Move requested"
    );

    let (system_prompt, user_message) = move_prompt(&request, sides);
    let raw = complete(&state, &system_prompt, &user_message).await?;

    let suggestion: MoveSuggestion =
        parse_reply(&raw).map_err(|_| ApiError::internal("Failed to parse analysis response"))?;

    if suggestion.san.trim().is_empty() {
        return Err(ApiError::internal("Analysis service failed to provide a move"));
    }

    info!(
        san = %suggestion.san,
        arrows = suggestion.arrows.as_ref().map_or(0, Vec::len),
        "Move suggested"
    );
    Ok(Json(suggestion))
}

/// `POST /chatMessage`.
#[instrument(skip_all)]
pub async fn chat_message(
    State(state): State<AppState>,
    body: Body,
) -> Result<Json<ChatReply>, ApiError> {
    let request: ChatRequest = read_json(&state, body).await?;
    info!(
        messages = request.message_history.len(),
        player_side = %request.player_side,
        "Chat requested"
    );

    let (system_prompt, user_message) = chat_prompt(&request);
    let raw = complete(&state, &system_prompt, &user_message).await?;

    let reply: ChatReply =
        parse_reply(&raw).map_err(|_| ApiError::internal("Failed to parse chat response"))?;

    if reply.response.trim().is_empty() {
        return Err(ApiError::internal("Chat service returned an empty response"));
    }

    info!(length = reply.response.len(), "Chat reply ready");
    Ok(Json(reply))
}

/// `GET /health`.
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "backend": state.backend.is_some(),
    }))
}

/// Adds CORS headers and answers preflight requests.
pub async fn cors(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        debug!(uri = %request.uri(), "Answering preflight");
        StatusCode::OK.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, state.allowed_origin.clone());
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("Content-Type"));
    response
}
