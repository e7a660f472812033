//! Terminal front end for Palaver.
//!
//! The simplest front end: reads lines from stdin, writes to stdout.
//! Input and output are generic tokio streams so the loop can be driven
//! from in-memory buffers in tests.

pub mod repl;
mod secret;
pub mod setup;

pub use repl::Terminal;
pub use setup::{SetupError, configure_session};
