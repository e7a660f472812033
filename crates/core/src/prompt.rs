//! Prompt assembly.

use crate::message::Turn;
use crate::provider::ChatMessage;

/// Build the message sequence for one submission.
///
/// Output is always: one system message (even when `system_instruction` is
/// empty), then every turn of `history` in order, then a single user message
/// holding `new_user_text`. `history` must not already contain the new text.
pub fn assemble(system_instruction: &str, history: &[Turn], new_user_text: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(system_instruction));
    messages.extend(history.iter().map(ChatMessage::from));
    messages.push(ChatMessage::user(new_user_text));
    messages
}
