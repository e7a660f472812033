//! Interactive session setup before the chat loop starts.
//!
//! Asks for an API key when none came from the environment, then offers to
//! change the model, temperature, max tokens and system prompt. Pressing
//! Enter at any prompt keeps the value shown in brackets.

use palaver_core::{ConfigError, Credential, SessionConfig};
use tokio::io::{self, AsyncBufRead, AsyncWrite};

use crate::repl::Terminal;

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("terminal I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Config(#[from] ConfigError),
}

/// Walk the user through the session settings and return a validated config.
///
/// `defaults` supplies the starting values; its credential may be empty, in
/// which case one is requested. Running out of input before a credential is
/// entered fails with [`ConfigError::MissingCredential`].
pub async fn configure_session<R, W>(
    term: &mut Terminal<R, W>,
    defaults: SessionConfig,
    credential_env: &str,
    known_models: &[String],
) -> Result<SessionConfig, SetupError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut config = defaults;

    if config.credential.is_empty() {
        term.write_line(&format!("No API key found in ${credential_env}.")).await?;
        config.credential = loop {
            let Some(line) = term.read_secret("Anthropic API key: ").await? else {
                return Err(ConfigError::MissingCredential.into());
            };
            let credential = Credential::new(line);
            if !credential.is_empty() {
                break credential;
            }
        };
    }

    let customize = term
        .read_line("Customize session settings? [y/N]: ")
        .await?
        .is_some_and(|answer| matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"));

    if customize {
        customize_settings(term, &mut config, known_models).await?;
    }

    config.validate()?;
    Ok(config)
}

async fn customize_settings<R, W>(
    term: &mut Terminal<R, W>,
    config: &mut SessionConfig,
    known_models: &[String],
) -> Result<(), SetupError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    if !known_models.is_empty() {
        term.write_line("Models:").await?;
        for (i, model) in known_models.iter().enumerate() {
            term.write_line(&format!("  {}. {model}", i + 1)).await?;
        }
    }
    let prompt = format!("Model (number or name) [{}]: ", config.model);
    if let Some(model) = ask(term, &prompt, |s| parse_model(s, known_models)).await? {
        config.model = model;
    }

    let prompt = format!("Temperature (0.0-1.0) [{}]: ", config.temperature);
    if let Some(temperature) = ask(term, &prompt, parse_temperature).await? {
        config.temperature = temperature;
    }

    let prompt = format!("Max tokens [{}]: ", config.max_output_tokens);
    if let Some(max_tokens) = ask(term, &prompt, parse_max_tokens).await? {
        config.max_output_tokens = max_tokens;
    }

    let prompt = "System prompt [Enter keeps current]: ";
    if let Some(instruction) = ask(term, prompt, |s| Ok::<_, String>(s.to_string())).await? {
        config.system_instruction = instruction;
    }

    Ok(())
}

/// Prompt until the answer parses. `None` for a blank answer or end of input.
async fn ask<R, W, T>(
    term: &mut Terminal<R, W>,
    prompt: &str,
    parse: impl Fn(&str) -> Result<T, String>,
) -> io::Result<Option<T>>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        let Some(line) = term.read_line(prompt).await? else {
            return Ok(None);
        };
        let answer = line.trim();
        if answer.is_empty() {
            return Ok(None);
        }
        match parse(answer) {
            Ok(value) => return Ok(Some(value)),
            Err(reason) => term.write_line(&reason).await?,
        }
    }
}

fn parse_model(answer: &str, known_models: &[String]) -> Result<String, String> {
    match answer.parse::<usize>() {
        Ok(n) if (1..=known_models.len()).contains(&n) => Ok(known_models[n - 1].clone()),
        Ok(_) => Err(format!("Pick a number between 1 and {}.", known_models.len())),
        Err(_) => Ok(answer.to_string()),
    }
}

fn parse_temperature(answer: &str) -> Result<f32, String> {
    match answer.parse::<f32>() {
        Ok(t) if (0.0..=1.0).contains(&t) => Ok(t),
        _ => Err("Please enter a number between 0.0 and 1.0.".into()),
    }
}

fn parse_max_tokens(answer: &str) -> Result<u32, String> {
    match answer.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err("Please enter a positive whole number.".into()),
    }
}
