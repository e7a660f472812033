//! JSON API behind the chat widget.
//!
//! Endpoints:
//!
//! - `GET  /health`        liveness check
//! - `GET  /api/models`    known model identifiers and the default
//! - `GET  /api/session`   settings, state and transcript of the session
//! - `PUT  /api/config`    apply sidebar settings, starting the session if needed
//! - `POST /api/chat`      send a message or a reserved command
//! - `POST /api/clear`     clear the transcript
//! - `POST /api/quit`      stop the server

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use palaver_core::{
    Command, Credential, ReplyWithMetadata, SessionConfig, SessionController, SessionState, Turn,
    with_metadata,
};

use crate::{SessionSlot, SharedState};

// ── Router ────────────────────────────────────────────────────────────────

pub fn api_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/models", get(models_handler))
        .route("/api/session", get(session_handler))
        .route("/api/config", put(update_config_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/clear", post(clear_handler))
        .route("/api/quit", post(quit_handler))
        .with_state(state)
}

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct ModelsResponse {
    models: Vec<String>,
    default: String,
}

/// Session settings as shown to the browser. The credential never leaves
/// the server; only whether one is set.
#[derive(Serialize)]
struct ConfigView {
    model: String,
    temperature: f32,
    max_output_tokens: u32,
    system_instruction: String,
    has_credential: bool,
}

impl From<&SessionConfig> for ConfigView {
    fn from(config: &SessionConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            system_instruction: config.system_instruction.clone(),
            has_credential: !config.credential.is_empty(),
        }
    }
}

#[derive(Serialize)]
struct SessionView {
    configured: bool,
    state: SessionState,
    last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<ConfigView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    transcript: Option<Vec<Turn>>,
}

impl SessionView {
    fn of(slot: &SessionSlot) -> Self {
        match &slot.session {
            Some(session) => Self {
                configured: true,
                state: session.state(),
                last_error: session.last_error().map(str::to_string),
                config: Some(session.config().into()),
                transcript: Some(session.transcript().snapshot().to_vec()),
            },
            None => Self {
                configured: false,
                state: SessionState::Idle,
                last_error: None,
                config: Some((&slot.draft).into()),
                transcript: Some(Vec::new()),
            },
        }
    }

    /// What is known while a submit holds the session.
    fn pending() -> Self {
        Self {
            configured: true,
            state: SessionState::AwaitingReply,
            last_error: None,
            config: None,
            transcript: None,
        }
    }
}

/// Sidebar settings. Omitted fields keep their current value, as does a
/// blank credential.
#[derive(Deserialize)]
struct ConfigUpdate {
    credential: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    max_output_tokens: Option<u32>,
    system_instruction: Option<String>,
}

impl ConfigUpdate {
    fn apply_to(self, mut config: SessionConfig) -> SessionConfig {
        if let Some(credential) = self.credential.map(Credential::new)
            && !credential.is_empty()
        {
            config.credential = credential;
        }
        if let Some(model) = self.model {
            config.model = model.trim().to_string();
        }
        if let Some(temperature) = self.temperature {
            config.temperature = temperature;
        }
        if let Some(max_output_tokens) = self.max_output_tokens {
            config.max_output_tokens = max_output_tokens;
        }
        if let Some(system_instruction) = self.system_instruction {
            config.system_instruction = system_instruction;
        }
        config
    }
}

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ChatResponse {
    Reply(ReplyWithMetadata),
    Cleared,
    Ignored,
    Quit,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn busy() -> ApiError {
    api_error(StatusCode::CONFLICT, "A reply is still pending")
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn models_handler(State(state): State<SharedState>) -> Json<ModelsResponse> {
    let mut models = state.provider.known_models();
    if !models.contains(&state.default_model) {
        models.insert(0, state.default_model.clone());
    }
    Json(ModelsResponse {
        models,
        default: state.default_model.clone(),
    })
}

async fn session_handler(State(state): State<SharedState>) -> Json<SessionView> {
    match state.slot.try_lock() {
        Ok(slot) => Json(SessionView::of(&slot)),
        Err(_) => Json(SessionView::pending()),
    }
}

async fn update_config_handler(
    State(state): State<SharedState>,
    Json(update): Json<ConfigUpdate>,
) -> Result<Json<SessionView>, ApiError> {
    let mut guard = state.slot.try_lock().map_err(|_| busy())?;
    let slot = &mut *guard;

    let current = match &slot.session {
        Some(session) => session.config().clone(),
        None => slot.draft.clone(),
    };
    let candidate = update.apply_to(current);

    let applied = if let Some(session) = slot.session.as_mut() {
        session.reconfigure(candidate.clone())
    } else {
        SessionController::new(candidate.clone(), state.provider.clone())
            .map(|session| slot.session = Some(session))
    };

    if let Err(e) = applied {
        warn!(error = %e, "Rejected session settings");
        return Err(api_error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()));
    }

    info!(model = %candidate.model, "Session settings applied");
    slot.draft = candidate;
    Ok(Json(SessionView::of(slot)))
}

async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let text = match Command::parse(&payload.message) {
        Command::Empty => return Ok(Json(ChatResponse::Ignored)),
        Command::Quit => {
            state.request_shutdown();
            return Ok(Json(ChatResponse::Quit));
        }
        Command::Clear => return clear_handler(State(state)).await,
        Command::Submit(text) => text,
    };

    let mut slot = state.slot.clone().try_lock_owned().map_err(|_| busy())?;
    if slot.session.is_none() {
        return Err(api_error(
            StatusCode::CONFLICT,
            "No session configured. Enter your API key in the sidebar and apply.",
        ));
    }

    // The submit runs in its own task holding the session lock, so a client
    // that disconnects mid-request cannot leave the session half-updated.
    let outcome = tokio::spawn(async move {
        let Some(session) = slot.session.as_mut() else {
            return Ok(None);
        };
        let outcome = session.submit(&text).await;
        outcome.map(|reply| reply.map(|reply| with_metadata(reply, session.config())))
    })
    .await
    .map_err(|e| {
        error!(error = %e, "Reply task failed");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "Reply task failed")
    })?;

    match outcome {
        Ok(Some(reply)) => Ok(Json(ChatResponse::Reply(reply))),
        Ok(None) => Ok(Json(ChatResponse::Ignored)),
        Err(e) => Err(api_error(StatusCode::BAD_GATEWAY, e.to_string())),
    }
}

async fn clear_handler(State(state): State<SharedState>) -> Result<Json<ChatResponse>, ApiError> {
    let mut slot = state.slot.try_lock().map_err(|_| busy())?;
    if let Some(session) = slot.session.as_mut() {
        session.clear();
    }
    Ok(Json(ChatResponse::Cleared))
}

async fn quit_handler(State(state): State<SharedState>) -> Json<ChatResponse> {
    state.request_shutdown();
    Json(ChatResponse::Quit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GatewayState;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use palaver_core::{InvocationError, Provider, ProviderRequest, ProviderResponse};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tower::ServiceExt;

    /// Replies "ok: <text>" to the last message, fails on "fail" and takes
    /// 200 ms to answer "slow".
    struct MockProvider {
        calls: Mutex<usize>,
    }

    #[async_trait::async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, InvocationError> {
            *self.calls.lock().unwrap() += 1;
            let last = request.messages.last().map(|m| m.content.clone()).unwrap_or_default();
            if last == "fail" {
                return Err(InvocationError::Network("connection refused".into()));
            }
            if last == "slow" {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            Ok(ProviderResponse {
                text: format!("ok: {last}"),
                model: request.model,
                usage: None,
            })
        }

        fn known_models(&self) -> Vec<String> {
            vec!["model-a".into(), "model-b".into()]
        }
    }

    fn defaults(credential: &str) -> SessionConfig {
        SessionConfig {
            model: "model-a".into(),
            temperature: 0.7,
            max_output_tokens: 1000,
            system_instruction: "Be helpful.".into(),
            credential: Credential::new(credential),
        }
    }

    fn test_state(credential: &str) -> (SharedState, Arc<MockProvider>) {
        let provider = Arc::new(MockProvider {
            calls: Mutex::new(0),
        });
        (GatewayState::new(defaults(credential), provider.clone()), provider)
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(state: &SharedState, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = api_router(state.clone()).oneshot(req).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn chat(state: &SharedState, message: &str) -> (StatusCode, serde_json::Value) {
        send(
            state,
            json_request("POST", "/api/chat", serde_json::json!({ "message": message })),
        )
        .await
    }

    #[tokio::test]
    async fn health_endpoint() {
        let (state, _) = test_state("sk-test");
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(&state, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn models_lists_known_and_default() {
        let (state, _) = test_state("sk-test");
        let req = Request::builder().uri("/api/models").body(Body::empty()).unwrap();
        let (_, body) = send(&state, req).await;
        assert_eq!(body["default"], "model-a");
        assert_eq!(body["models"], serde_json::json!(["model-a", "model-b"]));
    }

    #[tokio::test]
    async fn chat_returns_reply_with_metadata() {
        let (state, _) = test_state("sk-test");
        let (status, body) = chat(&state, "hello").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["kind"], "reply");
        assert_eq!(body["reply"], "ok: hello");
        assert_eq!(body["metadata"]["model"], "model-a");
        assert_eq!(body["metadata"]["max_output_tokens"], 1000);
        assert!(body["metadata"]["timestamp"].is_string());
    }

    #[tokio::test]
    async fn chat_without_session_is_conflict() {
        let (state, provider) = test_state("");
        let (status, body) = chat(&state, "hello").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("API key"));
        assert_eq!(*provider.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn chat_while_reply_pending_is_conflict() {
        let (state, _) = test_state("sk-test");
        let _held = state.slot.lock().await;

        let (status, _) = chat(&state, "hello").await;
        assert_eq!(status, StatusCode::CONFLICT);

        let req = Request::builder().uri("/api/session").body(Body::empty()).unwrap();
        let (status, body) = send(&state, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "awaiting_reply");
    }

    #[tokio::test]
    async fn dropped_chat_request_still_completes_the_turn() {
        let (state, provider) = test_state("sk-test");
        let req = json_request("POST", "/api/chat", serde_json::json!({ "message": "slow" }));

        // The browser goes away while the reply is pending.
        let abandoned = tokio::time::timeout(
            Duration::from_millis(50),
            api_router(state.clone()).oneshot(req),
        )
        .await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(400)).await;

        let req = Request::builder().uri("/api/session").body(Body::empty()).unwrap();
        let (_, body) = send(&state, req).await;
        assert_eq!(body["state"], "idle");
        let transcript = body["transcript"].as_array().unwrap();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[1]["content"], "ok: slow");
        assert_eq!(*provider.calls.lock().unwrap(), 1);

        let (status, _) = chat(&state, "next").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn invocation_failure_is_bad_gateway_and_session_survives() {
        let (state, _) = test_state("sk-test");
        let (status, body) = chat(&state, "fail").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].as_str().unwrap().contains("connection refused"));

        let req = Request::builder().uri("/api/session").body(Body::empty()).unwrap();
        let (_, session) = send(&state, req).await;
        assert_eq!(session["state"], "error");
        assert_eq!(session["transcript"].as_array().unwrap().len(), 1);

        let (status, _) = chat(&state, "again").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn blank_message_is_ignored() {
        let (state, provider) = test_state("sk-test");
        let (status, body) = chat(&state, "   ").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["kind"], "ignored");
        assert_eq!(*provider.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn clear_command_empties_transcript() {
        let (state, _) = test_state("sk-test");
        chat(&state, "hello").await;

        let (_, body) = chat(&state, " Clear ").await;
        assert_eq!(body["kind"], "cleared");
        assert!(state.slot.lock().await.session.as_ref().unwrap().transcript().is_empty());

        chat(&state, "hello").await;
        let (_, body) = send(&state, json_request("POST", "/api/clear", serde_json::json!({}))).await;
        assert_eq!(body["kind"], "cleared");
        assert!(state.slot.lock().await.session.as_ref().unwrap().transcript().is_empty());
    }

    #[tokio::test]
    async fn quit_command_requests_shutdown() {
        let (state, provider) = test_state("sk-test");
        let (_, body) = chat(&state, "QUIT").await;
        assert_eq!(body["kind"], "quit");
        assert_eq!(*provider.calls.lock().unwrap(), 0);

        let stopped = tokio::time::timeout(Duration::from_millis(100), state.shutdown_requested()).await;
        assert!(stopped.is_ok());
    }

    #[tokio::test]
    async fn quit_endpoint_requests_shutdown() {
        let (state, _) = test_state("sk-test");
        let (status, _) = send(&state, json_request("POST", "/api/quit", serde_json::json!({}))).await;
        assert_eq!(status, StatusCode::OK);

        let stopped = tokio::time::timeout(Duration::from_millis(100), state.shutdown_requested()).await;
        assert!(stopped.is_ok());
    }

    #[tokio::test]
    async fn config_creates_session_from_sidebar_credential() {
        let (state, _) = test_state("");
        let update = serde_json::json!({ "credential": "sk-typed", "temperature": 0.2 });
        let (status, body) = send(&state, json_request("PUT", "/api/config", update)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["configured"], true);
        assert_eq!(body["config"]["has_credential"], true);
        assert!(!body.to_string().contains("sk-typed"));

        let (status, _) = chat(&state, "hello").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn config_reconfigure_keeps_transcript_and_credential() {
        let (state, _) = test_state("sk-test");
        chat(&state, "hello").await;

        let update = serde_json::json!({ "credential": "  ", "model": "model-b", "max_output_tokens": 200 });
        let (status, body) = send(&state, json_request("PUT", "/api/config", update)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["config"]["model"], "model-b");
        assert_eq!(body["config"]["has_credential"], true);
        assert_eq!(body["transcript"].as_array().unwrap().len(), 2);

        let (_, reply) = chat(&state, "next").await;
        assert_eq!(reply["metadata"]["model"], "model-b");
        assert_eq!(reply["metadata"]["max_output_tokens"], 200);
    }

    #[tokio::test]
    async fn invalid_config_is_unprocessable() {
        let (state, _) = test_state("sk-test");
        let update = serde_json::json!({ "temperature": 1.5 });
        let (status, body) = send(&state, json_request("PUT", "/api/config", update)).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap().contains("1.5"));

        let slot = state.slot.lock().await;
        let temperature = slot.session.as_ref().unwrap().config().temperature;
        assert!((temperature - 0.7).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn config_without_any_credential_is_unprocessable() {
        let (state, _) = test_state("");
        let (status, _) = send(&state, json_request("PUT", "/api/config", serde_json::json!({}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(state.slot.lock().await.session.is_none());
    }

    #[tokio::test]
    async fn unconfigured_session_view_shows_draft() {
        let (state, _) = test_state("");
        let req = Request::builder().uri("/api/session").body(Body::empty()).unwrap();
        let (_, body) = send(&state, req).await;
        assert_eq!(body["configured"], false);
        assert_eq!(body["config"]["has_credential"], false);
        assert_eq!(body["config"]["model"], "model-a");
    }
}
