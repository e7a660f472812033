//! Anthropic native provider implementation.
//!
//! Uses Anthropic's Messages API directly.
//!
//! Features:
//! - `x-api-key` header authentication (not Bearer), key taken per request
//! - `anthropic-version` header
//! - System prompt as top-level field
//! - Reply text extracted from `text` content blocks

use async_trait::async_trait;
use palaver_core::error::InvocationError;
use palaver_core::message::Role;
use palaver_core::provider::{ChatMessage, Provider, ProviderRequest, ProviderResponse, Usage};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Models offered in model pickers.
pub const KNOWN_MODELS: &[&str] = &[
    "claude-sonnet-4-20250514",
    "claude-opus-4-20250514",
    "claude-3-5-haiku-20241022",
];

/// Anthropic native Messages API provider.
pub struct AnthropicProvider {
    name: String,
    base_url: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider. No request timeout is set: a hung
    /// call waits until the remote side answers or drops the connection.
    pub fn new() -> Self {
        Self {
            name: "anthropic".into(),
            base_url: DEFAULT_BASE_URL.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Extract system messages from the message list.
    /// Anthropic puts system prompt as a top-level field, not in messages.
    /// Blank instructions are dropped entirely.
    fn extract_system(messages: &[ChatMessage]) -> (Option<String>, Vec<&ChatMessage>) {
        let mut system_parts: Vec<&str> = Vec::new();
        let mut non_system: Vec<&ChatMessage> = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => {
                    if !msg.content.trim().is_empty() {
                        system_parts.push(&msg.content);
                    }
                }
                _ => non_system.push(msg),
            }
        }

        let system = if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        };

        (system, non_system)
    }

    /// Convert messages to Anthropic API format.
    fn to_api_messages(messages: &[&ChatMessage]) -> Vec<AnthropicMessage> {
        messages
            .iter()
            .map(|msg| AnthropicMessage {
                role: match msg.role {
                    Role::Assistant => "assistant",
                    _ => "user",
                },
                content: msg.content.clone(),
            })
            .collect()
    }

    fn build_body(request: &ProviderRequest) -> AnthropicRequest<'_> {
        let (system, messages) = Self::extract_system(&request.messages);
        AnthropicRequest {
            model: &request.model,
            messages: Self::to_api_messages(&messages),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system,
        }
    }

    /// Map a non-success HTTP status to an invocation error.
    fn status_error(status: u16, body: &str) -> InvocationError {
        let message = serde_json::from_str::<AnthropicErrorBody>(body)
            .map(|b| b.error.message)
            .unwrap_or_else(|_| body.to_string());

        match status {
            401 | 403 => InvocationError::AuthenticationFailed(message),
            429 => InvocationError::RateLimited(message),
            _ => InvocationError::Remote {
                status_code: status,
                message,
            },
        }
    }

    /// Convert Anthropic API response to our ProviderResponse.
    fn response_to_provider_response(
        resp: AnthropicResponse,
    ) -> Result<ProviderResponse, InvocationError> {
        let text = resp
            .content
            .iter()
            .filter_map(|block| match block {
                ResponseContentBlock::Text { text } => Some(text.as_str()),
                ResponseContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        if text.trim().is_empty() {
            return Err(InvocationError::EmptyResponse);
        }

        Ok(ProviderResponse {
            text,
            model: resp.model,
            usage: resp.usage.map(|u| Usage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
            }),
        })
    }
}

impl Default for AnthropicProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, InvocationError> {
        if request.credential.is_empty() {
            return Err(InvocationError::MissingCredential);
        }

        let url = format!("{}/v1/messages", self.base_url);
        let body = Self::build_body(&request);

        debug!(provider = "anthropic", model = %request.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", request.credential.expose())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| InvocationError::Network(e.to_string()))?;

        let status = response.status().as_u16();

        if !response.status().is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, "Anthropic API error");
            return Err(Self::status_error(status, &error_body));
        }

        let api_resp: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| InvocationError::MalformedResponse(format!("Failed to parse Anthropic response: {e}")))?;

        Self::response_to_provider_response(api_resp)
    }

    fn known_models(&self) -> Vec<String> {
        KNOWN_MODELS.iter().map(|m| m.to_string()).collect()
    }
}

// --- Anthropic API types ---

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    model: String,
    content: Vec<ResponseContentBlock>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    error: AnthropicErrorDetail,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorDetail {
    message: String,
}
