//! Reply metadata wrapper.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::session::SessionConfig;

/// The generation settings a reply was produced under.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplyMetadata {
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub timestamp: DateTime<Utc>,
}

/// A reply bundled with its [`ReplyMetadata`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplyWithMetadata {
    pub reply: String,
    pub metadata: ReplyMetadata,
}

/// Attach the config's generation settings and the current time to a reply.
pub fn with_metadata(reply: impl Into<String>, config: &SessionConfig) -> ReplyWithMetadata {
    ReplyWithMetadata {
        reply: reply.into(),
        metadata: ReplyMetadata {
            model: config.model.clone(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            timestamp: Utc::now(),
        },
    }
}
