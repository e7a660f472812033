//! Reserved user commands and front-end selection tags.

use serde::{Deserialize, Serialize};

/// What one line of user input asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Blank or whitespace-only input.
    Empty,
    /// Wipe the transcript and keep going.
    Clear,
    /// Leave the chat loop.
    Quit,
    /// Send the text, exactly as typed, to the model.
    Submit(String),
}

impl Command {
    /// Classify raw input. `clear`, `quit` and `exit` match case-insensitively.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Command::Empty;
        }
        if trimmed.eq_ignore_ascii_case("clear") {
            Command::Clear
        } else if trimmed.eq_ignore_ascii_case("quit") || trimmed.eq_ignore_ascii_case("exit") {
            Command::Quit
        } else {
            Command::Submit(input.to_string())
        }
    }
}

/// Which front end the process should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrontendKind {
    /// Browser chat widget served over HTTP
    Widget,
    /// Read-eval-print loop on stdin/stdout
    Terminal,
}

impl std::fmt::Display for FrontendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrontendKind::Widget => f.write_str("widget"),
            FrontendKind::Terminal => f.write_str("terminal"),
        }
    }
}

/// The user's stated preference, resolved to a [`FrontendKind`] by probing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrontendPreference {
    /// Widget when it can start, terminal otherwise
    #[default]
    Auto,
    Widget,
    Terminal,
}

impl std::str::FromStr for FrontendPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "widget" | "web" => Ok(Self::Widget),
            "terminal" | "cli" => Ok(Self::Terminal),
            other => Err(format!(
                "unknown front end '{other}' (expected auto, widget or terminal)"
            )),
        }
    }
}
