//! # Palaver Core
//!
//! Domain types, traits, and error definitions for the Palaver chat session.
//! This crate has **zero framework dependencies**: it defines the conversation
//! model that the provider, terminal, and gateway crates build against.
//!
//! ## Pieces
//!
//! - [`Transcript`]: ordered log of [`Turn`]s for one session
//! - [`prompt::assemble`]: system instruction + history + new text → messages
//! - [`SessionController`]: runs one user turn against a [`Provider`]
//! - [`Command`]: the reserved `clear` / `quit` words shared by every front end

pub mod command;
pub mod credential;
pub mod error;
pub mod message;
pub mod metadata;
pub mod prompt;
pub mod provider;
pub mod session;

// Re-export key types at crate root for ergonomics
pub use command::{Command, FrontendKind, FrontendPreference};
pub use credential::Credential;
pub use error::{ConfigError, Error, InvocationError, Result};
pub use message::{Role, Transcript, Turn};
pub use metadata::{ReplyMetadata, ReplyWithMetadata, with_metadata};
pub use prompt::assemble;
pub use provider::{ChatMessage, Provider, ProviderRequest, ProviderResponse, Usage};
pub use session::{SessionConfig, SessionController, SessionState};
