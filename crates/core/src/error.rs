//! Error types for the Palaver domain.
//!
//! Uses `thiserror` for ergonomic error definitions. Only two kinds of failure
//! exist in a session: a configuration that cannot start (or keep) a session,
//! and a model invocation that did not produce a reply. Empty input is not an
//! error at all; the session controller ignores it.

use thiserror::Error;

/// The top-level error type for Palaver operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invocation error: {0}")]
    Invocation(#[from] InvocationError),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// A session configuration that cannot be used.
///
/// Fatal to session start; never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("no API credential configured")]
    MissingCredential,

    #[error("temperature must be between 0.0 and 1.0, got {0}")]
    TemperatureOutOfRange(f32),

    #[error("max output tokens must be a positive integer")]
    InvalidMaxTokens,

    #[error("model identifier must not be empty")]
    EmptyModel,
}

/// The remote model call failed.
///
/// Recovered at the session controller boundary: the session stays usable and
/// the message is shown to the user.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvocationError {
    #[error("no API credential supplied with the request")]
    MissingCredential,

    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("rate limited by the model provider: {0}")]
    RateLimited(String),

    #[error("API request failed: {message} (status: {status_code})")]
    Remote { status_code: u16, message: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("the model returned an empty response")]
    EmptyResponse,
}
