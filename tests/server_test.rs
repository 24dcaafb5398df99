//! Tests for the coach backend routes, using a fake LLM backend.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use http_body_util::BodyExt;
use nara_chess::{AppState, CompletionBackend, LlmError, ServerConfig, router};
use tower::ServiceExt;

const AFTER_E4: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";

struct FakeBackend {
    reply: Result<String, String>,
    delay: Duration,
    prompts: Mutex<Vec<(String, String)>>,
}

impl FakeBackend {
    fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(text.to_string()),
            delay: Duration::ZERO,
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(message.to_string()),
            delay: Duration::ZERO,
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn last_user_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().unwrap().1.clone()
    }
}

#[async_trait::async_trait]
impl CompletionBackend for FakeBackend {
    async fn complete(&self, system_prompt: &str, user_message: &str) -> Result<String, LlmError> {
        self.prompts
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), user_message.to_string()));
        tokio::time::sleep(self.delay).await;
        self.reply.clone().map_err(LlmError::new)
    }
}

fn app(backend: Option<Arc<FakeBackend>>) -> axum::Router {
    let backend = backend.map(|b| b as Arc<dyn CompletionBackend>);
    router(AppState::from_config(&ServerConfig::default(), backend).unwrap())
}

fn post(uri: &str, body: impl Into<String>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.into()))
        .unwrap()
}

async fn text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn move_body() -> String {
    serde_json::json!({ "move_history": ["e4"], "fen": AFTER_E4 }).to_string()
}

#[tokio::test]
async fn test_submit_move_returns_suggestion() {
    let backend = FakeBackend::replying(
        r#"{"comment":"Classical.","move":"e5","arrows":[["g8","f6"]],"title":"Open Game"}"#,
    );
    let response = app(Some(backend.clone()))
        .oneshot(post("/submitMove", move_body()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&text(response).await).unwrap();
    assert_eq!(json["move"], "e5");
    assert_eq!(json["arrows"][0][1], "f6");
    assert_eq!(json["title"], "Open Game");

    let prompt = backend.last_user_prompt();
    assert!(prompt.contains("You play Black"));
    assert!(prompt.contains(AFTER_E4));
}

#[tokio::test]
async fn test_generate_move_alias_and_code_fence() {
    let backend = FakeBackend::replying("```json\n{\"comment\":\"ok\",\"move\":\"c5\"}\n```");
    let response = app(Some(backend)).oneshot(post("/generateMove", move_body())).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(text(response).await.contains("\"move\":\"c5\""));
}

#[tokio::test]
async fn test_rejected_moves_reach_the_prompt() {
    let backend = FakeBackend::replying(r#"{"comment":"","move":"Nf6"}"#);
    let body = serde_json::json!({
        "move_history": ["e4"],
        "fen": AFTER_E4,
        "wrong_move": "Qh5",
        "rejected_moves": ["Ke7"],
    });
    let response = app(Some(backend.clone()))
        .oneshot(post("/submitMove", body.to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let prompt = backend.last_user_prompt();
    assert!(prompt.contains("Qh5 is an INVALID MOVE"));
    assert!(prompt.contains("Ke7 is an INVALID MOVE"));
}

#[tokio::test]
async fn test_invalid_json_is_bad_request() {
    let response = app(Some(FakeBackend::replying("{}")))
        .oneshot(post("/submitMove", "{not json"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(text(response).await, "Invalid JSON");
}

#[tokio::test]
async fn test_unknown_field_is_bad_request() {
    let body = serde_json::json!({ "fen": AFTER_E4, "surprise": true });
    let response = app(Some(FakeBackend::replying("{}")))
        .oneshot(post("/submitMove", body.to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_oversized_body_is_bad_request() {
    let padding = "x".repeat(2 << 20);
    let body = serde_json::json!({ "fen": AFTER_E4, "move_history": [padding] });
    let response = app(Some(FakeBackend::replying("{}")))
        .oneshot(post("/submitMove", body.to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_fen_is_bad_request() {
    let response = app(Some(FakeBackend::replying("{}")))
        .oneshot(post("/submitMove", r#"{"move_history":["e4"]}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(text(response).await, "Missing FEN");
}

#[tokio::test]
async fn test_bad_fen_side_is_bad_request() {
    let response = app(Some(FakeBackend::replying("{}")))
        .oneshot(post("/submitMove", r#"{"fen":"8/8/8/8/8/8/8/8 x - - 0 1"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(text(response).await, "Invalid FEN");
}

#[tokio::test]
async fn test_missing_backend_is_unavailable() {
    let response = app(None).oneshot(post("/submitMove", move_body())).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(text(response).await, "Server configuration error");
}

#[tokio::test]
async fn test_empty_move_is_server_error() {
    let response = app(Some(FakeBackend::replying(r#"{"comment":"Hmm.","move":""}"#)))
        .oneshot(post("/submitMove", move_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(text(response).await, "Analysis service failed to provide a move");
}

#[tokio::test]
async fn test_backend_failure_is_server_error() {
    let response = app(Some(FakeBackend::failing("quota exceeded")))
        .oneshot(post("/submitMove", move_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_unparseable_reply_is_server_error() {
    let response = app(Some(FakeBackend::replying("I think e5 is best.")))
        .oneshot(post("/submitMove", move_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test(start_paused = true)]
async fn test_slow_backend_times_out() {
    let backend = Arc::new(FakeBackend {
        reply: Ok(r#"{"comment":"","move":"e5"}"#.to_string()),
        delay: Duration::from_secs(300),
        prompts: Mutex::new(Vec::new()),
    });
    let response = app(Some(backend)).oneshot(post("/submitMove", move_body())).await.unwrap();
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(text(response).await, "Analysis request timed out");
}

#[tokio::test]
async fn test_chat_message_round_trip() {
    let backend =
        FakeBackend::replying(r#"{"response":"Knights before bishops.","arrows":[["g1","f3"]]}"#);
    let body = serde_json::json!({
        "message_history": [
            { "content": "What now?", "role": "user" },
            { "content": "Develop.", "role": "model" },
            { "content": "Which piece?", "role": "user" }
        ],
        "game_state": {
            "move_history": ["e4", "e5"],
            "fen": "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2"
        },
        "player_side": "white"
    });
    let response = app(Some(backend.clone()))
        .oneshot(post("/chatMessage", body.to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&text(response).await).unwrap();
    assert_eq!(json["response"], "Knights before bishops.");

    let prompt = backend.last_user_prompt();
    assert!(prompt.contains("You play Black. Your pupil plays White."));
    assert!(prompt.contains("Pupil: What now?\nCoach: Develop.\nPupil: Which piece?\n"));
}

#[tokio::test]
async fn test_empty_chat_reply_is_server_error() {
    let body = serde_json::json!({
        "message_history": [{ "content": "Hi", "role": "user" }],
        "game_state": { "move_history": [], "fen": "" },
        "player_side": "black"
    });
    let response = app(Some(FakeBackend::replying(r#"{"response":"  "}"#)))
        .oneshot(post("/chatMessage", body.to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_preflight_gets_cors_headers() {
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/submitMove")
        .body(Body::empty())
        .unwrap();
    let response = app(None).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://localhost:5173");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "GET, POST, OPTIONS");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "Content-Type");
}

#[tokio::test]
async fn test_get_on_move_route_is_not_allowed() {
    let request = Request::builder().uri("/submitMove").body(Body::empty()).unwrap();
    let response = app(None).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_health_reports_backend() {
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app(None).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    let json: serde_json::Value = serde_json::from_str(&text(response).await).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["backend"], false);
}
