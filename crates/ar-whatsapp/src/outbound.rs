use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;

use ar_core::{domain::ReplyTarget, errors::Error, messaging::port::MessagingPort, Result};

use crate::types::GatewayFrame;

/// Sends replies by queueing `reply` frames for the connector's writer.
///
/// A reply counts as sent once it is queued; the bridge's `send_result` is
/// only logged.
#[derive(Debug)]
pub struct WhatsAppMessenger {
    account_id: String,
    writer: mpsc::UnboundedSender<GatewayFrame>,
    next_request: AtomicU64,
}

impl WhatsAppMessenger {
    pub fn new(account_id: impl Into<String>, writer: mpsc::UnboundedSender<GatewayFrame>) -> Self {
        Self {
            account_id: account_id.into(),
            writer,
            next_request: AtomicU64::new(1),
        }
    }

    fn request_id(&self) -> String {
        format!("r{}", self.next_request.fetch_add(1, Ordering::Relaxed))
    }
}

#[async_trait]
impl MessagingPort for WhatsAppMessenger {
    fn name(&self) -> &'static str {
        "whatsapp"
    }

    async fn reply(&self, target: &ReplyTarget, text: &str) -> Result<()> {
        let frame = GatewayFrame::Reply {
            request_id: self.request_id(),
            account_id: self.account_id.clone(),
            chat_id: target.chat_id.clone(),
            quoted_message_id: target.message_id.clone(),
            text: text.to_string(),
        };
        self.writer
            .send(frame)
            .map_err(|_| Error::Messaging("whatsapp bridge connection is closed".to_string()))
    }
}
