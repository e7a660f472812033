//! Palaver: the main entry point.
//!
//! Starts either the browser widget or the terminal chat:
//! - `--frontend auto`      widget when its port can be bound, else terminal
//! - `--frontend widget`    widget, falling back to terminal
//! - `--frontend terminal`  terminal only

use std::sync::Arc;

use clap::Parser;
use palaver_config::AppConfig;
use palaver_core::{FrontendKind, FrontendPreference, Provider};
use palaver_providers::AnthropicProvider;
use tracing::warn;

mod capability;
mod commands;

#[derive(Parser)]
#[command(
    name = "palaver",
    about = "Palaver: chat with Claude from the browser or the terminal",
    version,
    author
)]
struct Cli {
    /// Front end to start: auto, widget or terminal
    #[arg(short, long)]
    frontend: Option<FrontendPreference>,

    /// Override the widget port
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so the terminal chat on stdout stays readable.
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if let Some(frontend) = cli.frontend {
        config.frontend = frontend;
    }
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }

    let provider: Arc<dyn Provider> =
        Arc::new(AnthropicProvider::new().with_base_url(config.provider.base_url.clone()));

    match capability::select_frontend(config.frontend, &config.gateway.addr()) {
        FrontendKind::Widget => match palaver_gateway::bind(&config.gateway.addr()).await {
            Ok(listener) => commands::widget::run(listener, &config, provider).await?,
            Err(e) => {
                warn!(error = %e, "Widget unavailable, using the terminal");
                commands::terminal::run(&config, provider).await?;
            }
        },
        FrontendKind::Terminal => commands::terminal::run(&config, provider).await?,
    }

    Ok(())
}
