//! Terminal chat: interactive setup, then the read-eval-print loop.

use std::sync::Arc;

use palaver_config::AppConfig;
use palaver_core::{Provider, SessionController};
use palaver_terminal::{SetupError, Terminal, configure_session};
use tracing::info;

pub async fn run(config: &AppConfig, provider: Arc<dyn Provider>) -> Result<(), Box<dyn std::error::Error>> {
    let mut term = Terminal::stdio();

    let session_config = match configure_session(
        &mut term,
        config.session_config(),
        &config.provider.credential_env,
        &provider.known_models(),
    )
    .await
    {
        Ok(session_config) => session_config,
        Err(SetupError::Config(e)) => {
            eprintln!();
            eprintln!("  ERROR: {e}");
            eprintln!();
            eprintln!("  Set ${} or type a key when asked.", config.provider.credential_env);
            eprintln!("  Get an API key at: https://console.anthropic.com/");
            eprintln!();
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    let mut session = SessionController::new(session_config, provider)?;

    tokio::select! {
        result = term.run(&mut session) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
            println!("\nGoodbye!");
            // The stdin reader thread stays blocked until a newline arrives,
            // which would hold up runtime shutdown.
            std::process::exit(0);
        }
    }

    Ok(())
}
