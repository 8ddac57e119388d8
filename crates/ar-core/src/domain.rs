use std::sync::Arc;

use crate::{messaging::port::MessagingPort, Result};

/// Where a reply has to go: the conversation and, if the messenger supports
/// quoting, the message being answered.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ReplyTarget {
    pub chat_id: String,
    pub message_id: Option<String>,
}

/// Capability to answer exactly one inbound message.
#[derive(Clone)]
pub struct ReplyHandle {
    port: Arc<dyn MessagingPort>,
    target: ReplyTarget,
}

impl ReplyHandle {
    pub fn new(port: Arc<dyn MessagingPort>, target: ReplyTarget) -> Self {
        Self { port, target }
    }

    pub fn target(&self) -> &ReplyTarget {
        &self.target
    }

    pub async fn reply(&self, text: &str) -> Result<()> {
        self.port.reply(&self.target, text).await
    }
}

impl std::fmt::Debug for ReplyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplyHandle")
            .field("messenger", &self.port.name())
            .field("target", &self.target)
            .finish()
    }
}

/// One received message, alive for a single pass through the pipeline.
#[derive(Clone, Debug)]
pub struct InboundMessage {
    pub sender_address: String,
    pub sender_identifier: String,
    pub body: String,
    pub reply_handle: ReplyHandle,
}

impl InboundMessage {
    pub fn new(
        sender_address: impl Into<String>,
        body: impl Into<String>,
        reply_handle: ReplyHandle,
    ) -> Self {
        let sender_address = sender_address.into();
        let sender_identifier = sender_identifier(&sender_address).to_string();
        Self {
            sender_address,
            sender_identifier,
            body: body.into(),
            reply_handle,
        }
    }
}

/// Part of a raw sender address before the first `@`, or the whole address
/// when it has none (`"555111@c.us"` -> `"555111"`).
pub fn sender_identifier(address: &str) -> &str {
    address.split('@').next().unwrap_or(address)
}
