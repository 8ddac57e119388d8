//! Telegram adapter (teloxide).
//!
//! Implements the `ar-core` `SessionConnector` and `MessagingPort` over the
//! Telegram Bot API.

use async_trait::async_trait;

use teloxide::prelude::*;

use tokio::time::sleep;

pub mod connector;

pub use connector::TelegramConnector;

use ar_core::{domain::ReplyTarget, errors::Error, messaging::port::MessagingPort, Result};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::Messaging(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

/// Chat and quoted message ids of a reply target, as Telegram types.
fn parse_target(
    target: &ReplyTarget,
) -> Result<(teloxide::types::ChatId, Option<teloxide::types::MessageId>)> {
    let chat_id = target
        .chat_id
        .parse::<i64>()
        .map_err(|_| Error::Messaging(format!("invalid telegram chat id: {}", target.chat_id)))?;
    let message_id = match &target.message_id {
        Some(id) => Some(teloxide::types::MessageId(id.parse::<i32>().map_err(|_| {
            Error::Messaging(format!("invalid telegram message id: {id}"))
        })?)),
        None => None,
    };
    Ok((teloxide::types::ChatId(chat_id), message_id))
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn reply(&self, target: &ReplyTarget, text: &str) -> Result<()> {
        let (chat_id, quoted) = parse_target(target)?;
        self.with_retry(|| {
            let req = self.bot.send_message(chat_id, text.to_string());
            match quoted {
                Some(id) => req.reply_to_message_id(id),
                None => req,
            }
        })
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numeric_target() {
        let (chat, msg) = parse_target(&ReplyTarget {
            chat_id: "-100123".to_string(),
            message_id: Some("42".to_string()),
        })
        .unwrap();
        assert_eq!(chat, teloxide::types::ChatId(-100123));
        assert_eq!(msg, Some(teloxide::types::MessageId(42)));
    }

    #[test]
    fn rejects_non_numeric_target() {
        let err = parse_target(&ReplyTarget {
            chat_id: "555111@c.us".to_string(),
            message_id: None,
        })
        .unwrap_err();
        assert!(matches!(err, Error::Messaging(_)));

        let err = parse_target(&ReplyTarget {
            chat_id: "1".to_string(),
            message_id: Some("abc".to_string()),
        })
        .unwrap_err();
        assert!(matches!(err, Error::Messaging(_)));
    }
}
