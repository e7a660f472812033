//! Browser widget: serve the chat page until the user quits.

use std::sync::Arc;

use palaver_config::AppConfig;
use palaver_core::Provider;
use palaver_gateway::GatewayState;
use tokio::net::TcpListener;

pub async fn run(
    listener: TcpListener,
    config: &AppConfig,
    provider: Arc<dyn Provider>,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = listener.local_addr()?;

    println!("Palaver widget");
    println!("   Open:      http://{addr}/");
    if !config.has_credential() {
        println!("   API key:   not set, enter it in the sidebar");
    }
    println!("   Stop with: 'quit' in the chat, the Quit button, or Ctrl-C");

    let state = GatewayState::new(config.session_config(), provider);
    palaver_gateway::serve(listener, state).await?;

    println!("Goodbye!");
    Ok(())
}
