//! Configuration loading and validation for Palaver.
//!
//! Covers how Palaver presents itself: which front end to start, where the
//! widget listens, which API endpoint to call and which environment variable
//! holds the API key. Hardcoded defaults come first, then an optional preset
//! file at `~/.palaver/config.toml`, then environment variable overrides.
//!
//! Session parameters (model, temperature, max tokens, system prompt) are not
//! configurable here. They start from the constants below and change only
//! through interactive setup or the widget sidebar. The API credential is
//! only ever read from the environment (or typed in by the user later); it
//! has no place in the preset file.

use palaver_core::{Credential, FrontendPreference, SessionConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Model a new session starts with.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Temperature a new session starts with.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Reply length limit a new session starts with.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 1000;

/// System prompt a new session starts with.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are a helpful AI assistant. You are knowledgeable, \
     friendly, and aim to provide accurate and helpful responses. You can engage in conversations \
     on a wide variety of topics.";

/// Environment variable the credential is read from unless configured otherwise.
pub const DEFAULT_CREDENTIAL_ENV: &str = "ANTHROPIC_API_KEY";

/// The root configuration structure.
///
/// Maps directly to `~/.palaver/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Which front end to start: "auto", "widget" or "terminal"
    #[serde(default)]
    pub frontend: FrontendPreference,

    /// Widget server settings
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Remote API settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Credential picked up from the environment at load time
    #[serde(skip)]
    pub credential: Option<Credential>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    8501
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

impl GatewayConfig {
    /// `host:port` suitable for binding.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the Messages API (override for proxies)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Name of the environment variable holding the API key
    #[serde(default = "default_credential_env")]
    pub credential_env: String,
}

fn default_base_url() -> String {
    "https://api.anthropic.com".into()
}
fn default_credential_env() -> String {
    DEFAULT_CREDENTIAL_ENV.into()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            credential_env: default_credential_env(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.palaver/config.toml),
    /// then apply environment overrides:
    /// - `PALAVER_FRONTEND`
    /// - `PALAVER_PORT`
    /// - the credential variable (default `ANTHROPIC_API_KEY`)
    pub fn load() -> Result<Self, ConfigFileError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            tracing::debug!("No preset file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigFileError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let parse_error = |e: toml::de::Error| ConfigFileError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };
        let table: toml::Table = toml::from_str(&content).map_err(parse_error)?;
        if table.contains_key("session") {
            tracing::warn!(
                "Ignoring [session] in {}: session settings are chosen at startup",
                path.display()
            );
        }
        let config: Self = toml::Value::Table(table).try_into().map_err(parse_error)?;

        config.validate()?;
        tracing::info!("Loaded preset from {}", path.display());
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigFileError> {
        if let Some(frontend) = lookup("PALAVER_FRONTEND") {
            self.frontend = frontend.parse().map_err(ConfigFileError::Override)?;
        }

        if let Some(port) = lookup("PALAVER_PORT") {
            self.gateway.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigFileError::Override(format!("PALAVER_PORT is not a port: {port}")))?;
        }

        self.credential = lookup(&self.provider.credential_env)
            .map(Credential::new)
            .filter(|c| !c.is_empty());

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".palaver")
    }

    fn validate(&self) -> Result<(), ConfigFileError> {
        if self.gateway.host.trim().is_empty() {
            return Err(ConfigFileError::Invalid("gateway.host must not be empty".into()));
        }
        let base_url = &self.provider.base_url;
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigFileError::Invalid(format!(
                "provider.base_url must be an http(s) URL, got {base_url:?}"
            )));
        }
        if self.provider.credential_env.trim().is_empty() {
            return Err(ConfigFileError::Invalid(
                "provider.credential_env must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Check if an API key was found in the environment.
    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    /// Build the starting session configuration from the hardcoded session
    /// defaults. The credential is empty when none was found, so
    /// `SessionConfig::validate` will refuse it until one is supplied.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            model: DEFAULT_MODEL.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.into(),
            credential: self.credential.clone().unwrap_or_default(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            frontend: FrontendPreference::default(),
            gateway: GatewayConfig::default(),
            provider: ProviderConfig::default(),
            credential: None,
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    Invalid(String),

    #[error("Invalid environment override: {0}")]
    Override(String),
}
