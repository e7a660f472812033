//! Remote model provider implementations for Palaver.
//!
//! All providers implement the `palaver_core::Provider` trait. Anthropic's
//! Messages API is the only backend.

pub mod anthropic;

pub use anthropic::AnthropicProvider;
