use std::sync::Arc;

use async_trait::async_trait;
use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tokio::sync::mpsc;
use tracing::{debug, info};

use ar_core::{
    config::TelegramConfig,
    domain::{InboundMessage, ReplyHandle, ReplyTarget},
    errors::Error,
    events::ConnectorEvent,
    messaging::{connector::SessionConnector, port::MessagingPort},
    Result,
};

use crate::TelegramMessenger;

/// Session connector polling the Telegram Bot API.
pub struct TelegramConnector {
    bot: Bot,
}

impl TelegramConnector {
    pub fn new(cfg: &TelegramConfig) -> Self {
        Self {
            bot: Bot::new(cfg.bot_token.clone()),
        }
    }
}

struct InboundState {
    events: mpsc::Sender<ConnectorEvent>,
    messenger: Arc<dyn MessagingPort>,
}

#[async_trait]
impl SessionConnector for TelegramConnector {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn run(&self, events: mpsc::Sender<ConnectorEvent>) -> Result<()> {
        let me = match self.bot.get_me().await {
            Ok(me) => me,
            Err(e) => {
                let message = format!("telegram get_me failed: {e}");
                let _ = events
                    .send(ConnectorEvent::Error {
                        message: message.clone(),
                    })
                    .await;
                return Err(Error::Connector(message));
            }
        };
        info!(username = %me.username(), "telegram bot connected");
        let _ = events.send(ConnectorEvent::Ready).await;

        let state = Arc::new(InboundState {
            events,
            messenger: Arc::new(TelegramMessenger::new(self.bot.clone())),
        });

        let handler = Update::filter_message().endpoint(handle_message);

        Dispatcher::builder(self.bot.clone(), handler)
            .dependencies(dptree::deps![state])
            .build()
            .dispatch()
            .await;

        Ok(())
    }
}

async fn handle_message(msg: Message, state: Arc<InboundState>) -> ResponseResult<()> {
    let (Some(user), Some(text)) = (msg.from(), msg.text()) else {
        return Ok(());
    };

    let target = ReplyTarget {
        chat_id: msg.chat.id.0.to_string(),
        message_id: Some(msg.id.0.to_string()),
    };
    let inbound = InboundMessage::new(
        sender_address(user.username.as_deref(), user.id.0),
        text,
        ReplyHandle::new(state.messenger.clone(), target),
    );

    if state
        .events
        .send(ConnectorEvent::Message(inbound))
        .await
        .is_err()
    {
        debug!("event receiver dropped, ignoring telegram message");
    }
    Ok(())
}

/// Telegram has no `user@host` addresses; the username (or numeric id) is the
/// whole address.
fn sender_address(username: Option<&str>, user_id: u64) -> String {
    match username {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => user_id.to_string(),
    }
}
