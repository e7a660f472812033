//! The session controller: one transcript, one configuration, one provider.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::credential::Credential;
use crate::error::{ConfigError, InvocationError};
use crate::message::{Transcript, Turn};
use crate::prompt::assemble;
use crate::provider::{Provider, ProviderRequest};

/// Parameters governing one conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub system_instruction: String,
    pub credential: Credential,
}

impl SessionConfig {
    /// Check every field. A config that fails here cannot start a session.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::EmptyModel);
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(ConfigError::TemperatureOutOfRange(self.temperature));
        }
        if self.max_output_tokens == 0 {
            return Err(ConfigError::InvalidMaxTokens);
        }
        if self.credential.is_empty() {
            return Err(ConfigError::MissingCredential);
        }
        Ok(())
    }
}

/// Label for the outcome of the most recent submission.
///
/// `Error` never blocks further submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    AwaitingReply,
    Error,
}

/// Runs user turns against a provider and keeps the transcript.
pub struct SessionController {
    config: SessionConfig,
    transcript: Transcript,
    provider: Arc<dyn Provider>,
    state: SessionState,
    last_error: Option<String>,
}

impl SessionController {
    /// Start a session. Fails if `config` does not validate.
    pub fn new(config: SessionConfig, provider: Arc<dyn Provider>) -> Result<Self, ConfigError> {
        config.validate()?;
        info!(provider = provider.name(), model = %config.model, "Session started");
        Ok(Self {
            config,
            transcript: Transcript::new(),
            provider,
            state: SessionState::Idle,
            last_error: None,
        })
    }

    /// Send one user message and wait for the reply.
    ///
    /// Returns `Ok(None)` without touching anything when `user_text` is blank.
    /// On failure the user turn stays in the transcript and no assistant turn
    /// is added.
    pub async fn submit(&mut self, user_text: &str) -> Result<Option<String>, InvocationError> {
        if user_text.trim().is_empty() {
            return Ok(None);
        }

        let prior = self.transcript.len();
        self.transcript.append(Turn::user(user_text));

        let messages = assemble(
            &self.config.system_instruction,
            &self.transcript.snapshot()[..prior],
            user_text,
        );
        let request = ProviderRequest {
            model: self.config.model.clone(),
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_output_tokens,
            credential: self.config.credential.clone(),
        };

        debug!(
            provider = self.provider.name(),
            model = %request.model,
            messages = request.messages.len(),
            "Submitting turn"
        );
        self.state = SessionState::AwaitingReply;

        let outcome = match self.provider.complete(request).await {
            Ok(response) if response.text.trim().is_empty() => Err(InvocationError::EmptyResponse),
            Ok(response) => Ok(response),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(response) => {
                if let Some(usage) = response.usage {
                    debug!(
                        model = %response.model,
                        input_tokens = usage.input_tokens,
                        output_tokens = usage.output_tokens,
                        "Reply received"
                    );
                }
                self.transcript.append(Turn::assistant(&response.text));
                self.state = SessionState::Idle;
                self.last_error = None;
                Ok(Some(response.text))
            }
            Err(e) => {
                warn!(error = %e, "Model invocation failed");
                self.state = SessionState::Error;
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Drop the whole transcript. Configuration is left alone.
    pub fn clear(&mut self) {
        self.transcript.clear();
        self.state = SessionState::Idle;
        self.last_error = None;
        info!("Transcript cleared");
    }

    /// Replace the configuration. The transcript is kept and replayed under
    /// the new settings on the next submit. An invalid config is rejected and
    /// the current one stays.
    pub fn reconfigure(&mut self, config: SessionConfig) -> Result<(), ConfigError> {
        config.validate()?;
        info!(model = %config.model, temperature = config.temperature, "Session reconfigured");
        self.config = config;
        Ok(())
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Message of the last failed submission, until the next success or clear.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;
    use crate::provider::{ChatMessage, ProviderResponse};
    use std::sync::Mutex;

    /// Returns scripted results in order and records every request.
    struct ScriptedProvider {
        results: Mutex<Vec<Result<ProviderResponse, InvocationError>>>,
        requests: Mutex<Vec<ProviderRequest>>,
    }

    impl ScriptedProvider {
        fn new(results: Vec<Result<ProviderResponse, InvocationError>>) -> Self {
            Self {
                results: Mutex::new(results),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn replies(texts: &[&str]) -> Self {
            Self::new(texts.iter().map(|t| Ok(text_response(t))).collect())
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        fn request(&self, index: usize) -> ProviderRequest {
            self.requests.lock().unwrap()[index].clone()
        }
    }

    #[async_trait::async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, InvocationError> {
            self.requests.lock().unwrap().push(request);
            let mut results = self.results.lock().unwrap();
            if results.is_empty() {
                panic!("ScriptedProvider exhausted");
            }
            results.remove(0)
        }
    }

    fn text_response(text: &str) -> ProviderResponse {
        ProviderResponse {
            text: text.to_string(),
            model: "mock-model".into(),
            usage: None,
        }
    }

    fn test_config() -> SessionConfig {
        SessionConfig {
            model: "mock-model".into(),
            temperature: 0.7,
            max_output_tokens: 1000,
            system_instruction: "You are helpful.".into(),
            credential: Credential::new("sk-test"),
        }
    }

    fn session(provider: Arc<ScriptedProvider>) -> SessionController {
        SessionController::new(test_config(), provider).unwrap()
    }

    #[tokio::test]
    async fn successful_submit_adds_user_then_assistant() {
        let provider = Arc::new(ScriptedProvider::replies(&["Hi there"]));
        let mut s = session(provider.clone());

        let reply = s.submit("hello").await.unwrap();
        assert_eq!(reply.as_deref(), Some("Hi there"));

        let turns = s.transcript().snapshot();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0], Turn::user("hello"));
        assert_eq!(turns[1], Turn::assistant("Hi there"));
        assert_eq!(s.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn blank_submit_is_ignored() {
        let provider = Arc::new(ScriptedProvider::replies(&[]));
        let mut s = session(provider.clone());

        assert_eq!(s.submit("   \n\t").await.unwrap(), None);
        assert!(s.transcript().is_empty());
        assert_eq!(provider.calls(), 0);
        assert_eq!(s.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn new_text_is_sent_once_after_history() {
        let provider = Arc::new(ScriptedProvider::replies(&["b", "d"]));
        let mut s = session(provider.clone());

        s.submit("a").await.unwrap();
        s.submit("c").await.unwrap();

        let second = provider.request(1);
        assert_eq!(
            second.messages,
            vec![
                ChatMessage::system("You are helpful."),
                ChatMessage::user("a"),
                ChatMessage::assistant("b"),
                ChatMessage::user("c"),
            ]
        );
        assert_eq!(second.max_tokens, 1000);
        assert_eq!(second.credential.expose(), "sk-test");
    }

    #[tokio::test]
    async fn surrounding_whitespace_is_kept_verbatim() {
        let provider = Arc::new(ScriptedProvider::replies(&["ok"]));
        let mut s = session(provider.clone());

        s.submit("  indented\n    code  ").await.unwrap();

        assert_eq!(s.transcript().snapshot()[0].content(), "  indented\n    code  ");
        assert_eq!(
            provider.request(0).messages.last(),
            Some(&ChatMessage::user("  indented\n    code  "))
        );
    }

    #[tokio::test]
    async fn failure_keeps_user_turn_and_reports_error() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(InvocationError::Network("connection reset".into())),
            Ok(text_response("recovered")),
        ]));
        let mut s = session(provider.clone());

        let err = s.submit("hello").await.unwrap_err();
        assert_eq!(err, InvocationError::Network("connection reset".into()));
        assert_eq!(s.transcript().len(), 1);
        assert_eq!(s.transcript().snapshot()[0].role(), Role::User);
        assert_eq!(s.state(), SessionState::Error);
        assert!(s.last_error().unwrap().contains("connection reset"));

        // Error does not block the next submission.
        let reply = s.submit("again").await.unwrap();
        assert_eq!(reply.as_deref(), Some("recovered"));
        assert_eq!(s.state(), SessionState::Idle);
        assert!(s.last_error().is_none());
        assert_eq!(s.transcript().len(), 3);
    }

    #[tokio::test]
    async fn blank_reply_is_an_empty_response_error() {
        let provider = Arc::new(ScriptedProvider::replies(&["  "]));
        let mut s = session(provider);

        let err = s.submit("hello").await.unwrap_err();
        assert_eq!(err, InvocationError::EmptyResponse);
        assert_eq!(s.transcript().len(), 1);
    }

    #[tokio::test]
    async fn clear_then_submit_matches_fresh_session() {
        let provider = Arc::new(ScriptedProvider::replies(&["one", "two"]));
        let mut s = session(provider.clone());

        s.submit("first").await.unwrap();
        s.clear();
        assert_eq!(s.transcript().len(), 0);

        s.submit("hi").await.unwrap();
        assert_eq!(
            provider.request(1).messages,
            vec![ChatMessage::system("You are helpful."), ChatMessage::user("hi")]
        );
    }

    #[tokio::test]
    async fn reconfigure_keeps_transcript_and_applies_to_next_submit() {
        let provider = Arc::new(ScriptedProvider::replies(&["x", "y"]));
        let mut s = session(provider.clone());
        s.submit("first").await.unwrap();

        let mut config = test_config();
        config.model = "other-model".into();
        config.temperature = 0.1;
        s.reconfigure(config).unwrap();
        assert_eq!(s.transcript().len(), 2);

        s.submit("second").await.unwrap();
        let req = provider.request(1);
        assert_eq!(req.model, "other-model");
        assert!((req.temperature - 0.1).abs() < f32::EPSILON);
        assert_eq!(req.messages.len(), 4);
    }

    #[test]
    fn invalid_reconfigure_keeps_old_config() {
        let provider = Arc::new(ScriptedProvider::replies(&[]));
        let mut s = session(provider);

        let mut bad = test_config();
        bad.temperature = 1.5;
        assert_eq!(s.reconfigure(bad), Err(ConfigError::TemperatureOutOfRange(1.5)));
        assert!((s.config().temperature - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn missing_credential_is_fatal_to_start() {
        let provider = Arc::new(ScriptedProvider::replies(&[]));
        let mut config = test_config();
        config.credential = Credential::default();
        let result = SessionController::new(config, provider);
        assert!(matches!(result, Err(ConfigError::MissingCredential)));
    }

    #[test]
    fn validation_rules() {
        let mut c = test_config();
        c.max_output_tokens = 0;
        assert_eq!(c.validate(), Err(ConfigError::InvalidMaxTokens));

        let mut c = test_config();
        c.model = "  ".into();
        assert_eq!(c.validate(), Err(ConfigError::EmptyModel));

        let mut c = test_config();
        c.temperature = 0.0;
        assert!(c.validate().is_ok());
        c.temperature = 1.0;
        assert!(c.validate().is_ok());
        c.temperature = -0.1;
        assert!(c.validate().is_err());
    }
}
