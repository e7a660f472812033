//! HTTP gateway for the Palaver browser widget.
//!
//! Serves the embedded single-page chat widget and the small JSON API it
//! talks to. All requests share one in-process session.
//!
//! Built on Axum.

pub mod api;
pub mod frontend;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, Notify};
use tracing::info;

use palaver_core::{Provider, SessionConfig, SessionController};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub(crate) slot: Arc<Mutex<SessionSlot>>,
    pub(crate) provider: Arc<dyn Provider>,
    pub(crate) default_model: String,
    shutdown: Notify,
}

/// The settings the sidebar edits, plus the session once one could start.
pub(crate) struct SessionSlot {
    pub(crate) draft: SessionConfig,
    pub(crate) session: Option<SessionController>,
}

pub type SharedState = Arc<GatewayState>;

impl GatewayState {
    /// Build gateway state from starting settings.
    ///
    /// When `defaults` already validates (for instance the credential came
    /// from the environment) the session starts right away; otherwise the
    /// widget has to supply the missing pieces through `PUT /api/config`.
    pub fn new(defaults: SessionConfig, provider: Arc<dyn Provider>) -> SharedState {
        let session = SessionController::new(defaults.clone(), provider.clone()).ok();
        Arc::new(Self {
            default_model: defaults.model.clone(),
            slot: Arc::new(Mutex::new(SessionSlot {
                draft: defaults,
                session,
            })),
            provider,
            shutdown: Notify::new(),
        })
    }

    /// Ask the server to stop after in-flight requests finish.
    pub fn request_shutdown(&self) {
        self.shutdown.notify_one();
    }

    async fn shutdown_requested(&self) {
        self.shutdown.notified().await;
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Build the full router: widget assets plus the JSON API.
///
/// Layers applied:
/// - Request body size limit (1 MB)
/// - HTTP trace logging
pub fn build_router(state: SharedState) -> Router {
    api::api_router(state)
        .merge(frontend::frontend_router())
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Bind the widget listener.
pub async fn bind(addr: &str) -> Result<TcpListener, GatewayError> {
    TcpListener::bind(addr).await.map_err(|source| GatewayError::Bind {
        addr: addr.to_string(),
        source,
    })
}

/// Serve the widget until `quit` is received or the process gets Ctrl-C.
pub async fn serve(listener: TcpListener, state: SharedState) -> Result<(), GatewayError> {
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "Widget available at http://{addr}/");
    }

    let app = build_router(state.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = state.shutdown_requested() => info!("Quit requested from the widget"),
                _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
            }
        })
        .await
        .map_err(GatewayError::Serve)
}
