//! Prompt construction.
//!
//! The body is inserted verbatim: a body containing `"` can close the quoted
//! section and steer the model. Nothing here escapes it.

use crate::{
    domain::InboundMessage,
    model::types::{ChatMessage, CompletionRequest},
};

pub fn build_prompt(sender_identifier: &str, body: &str) -> String {
    format!("Reply on my behalf to the sender's {sender_identifier} message: \"{body}\"")
}

/// Single system-role request for `msg`.
pub fn build_request(model: &str, msg: &InboundMessage) -> CompletionRequest {
    CompletionRequest {
        model: model.to_string(),
        messages: vec![ChatMessage::system(build_prompt(
            &msg.sender_identifier,
            &msg.body,
        ))],
    }
}
