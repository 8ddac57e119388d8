//! Reply pipeline: one inbound message in, at most one reply out.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::{
    domain::InboundMessage,
    errors::Error,
    events::{ConnectorEvent, EventHandler},
    history::ConversationLog,
    model::client::CompletionClient,
    prompt::build_request,
    Result,
};

pub struct ReplyPipeline {
    model: String,
    completions: Arc<dyn CompletionClient>,
    history: Arc<ConversationLog>,
}

impl ReplyPipeline {
    pub fn new(
        model: impl Into<String>,
        completions: Arc<dyn CompletionClient>,
        history: Arc<ConversationLog>,
    ) -> Self {
        Self {
            model: model.into(),
            completions,
            history,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn history(&self) -> &Arc<ConversationLog> {
        &self.history
    }

    /// Ask the model for a reply to `msg` and send it back to the sender.
    ///
    /// Exactly one completion request per call and, on success, exactly one
    /// reply. Returns the text that was sent. A first choice that is blank
    /// after trimming is an `Error::Completion` and nothing is sent.
    pub async fn handle_message(&self, msg: &InboundMessage) -> Result<String> {
        let req = build_request(&self.model, msg);
        debug!(sender = %msg.sender_identifier, model = %self.model, "requesting completion");

        let completion = self.completions.complete(req).await?;
        let reply = completion
            .first()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Completion("completion returned no text".to_string()))?
            .to_string();

        msg.reply_handle.reply(&reply).await?;
        self.history
            .record(&msg.sender_identifier, &msg.body, &reply)
            .await;

        info!(sender = %msg.sender_identifier, chars = reply.chars().count(), "reply sent");
        Ok(reply)
    }
}

/// Failed messages are dropped here: logged, not retried, and the sender is
/// left without an answer.
#[async_trait]
impl EventHandler for ReplyPipeline {
    async fn handle(&self, event: &ConnectorEvent) -> Result<()> {
        let ConnectorEvent::Message(msg) = event else {
            return Ok(());
        };
        if let Err(e) = self.handle_message(msg).await {
            warn!(sender = %msg.sender_identifier, error = %e, "no reply sent");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::{
        domain::{ReplyHandle, ReplyTarget},
        messaging::port::MessagingPort,
        model::types::{ChatRole, Completion, CompletionRequest},
    };

    #[derive(Default)]
    struct FakeMessenger {
        replies: Mutex<Vec<(ReplyTarget, String)>>,
        fail: bool,
    }

    impl FakeMessenger {
        fn replies(&self) -> Vec<(ReplyTarget, String)> {
            self.replies.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessagingPort for FakeMessenger {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn reply(&self, target: &ReplyTarget, text: &str) -> Result<()> {
            if self.fail {
                return Err(Error::Messaging("send failed".to_string()));
            }
            self.replies
                .lock()
                .unwrap()
                .push((target.clone(), text.to_string()));
            Ok(())
        }
    }

    /// Returns `reply` for every request, or fails when `reply` is `None`.
    struct ScriptedCompletion {
        reply: Option<Vec<String>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedCompletion {
        fn ok(text: &str) -> Self {
            Self::choices(vec![text.to_string()])
        }

        fn choices(choices: Vec<String>) -> Self {
            Self {
                reply: Some(choices),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: None,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedCompletion {
        async fn complete(&self, req: CompletionRequest) -> Result<Completion> {
            self.requests.lock().unwrap().push(req);
            match &self.reply {
                Some(choices) => Ok(Completion {
                    choices: choices.clone(),
                }),
                None => Err(Error::Completion("connection reset".to_string())),
            }
        }
    }

    fn message(
        messenger: Arc<FakeMessenger>,
        from: &str,
        body: &str,
    ) -> InboundMessage {
        let target = ReplyTarget {
            chat_id: from.to_string(),
            message_id: Some("m1".to_string()),
        };
        InboundMessage::new(from, body, ReplyHandle::new(messenger, target))
    }

    fn pipeline(completions: Arc<ScriptedCompletion>) -> ReplyPipeline {
        ReplyPipeline::new(
            "gpt-3.5-turbo",
            completions,
            Arc::new(ConversationLog::default()),
        )
    }

    #[tokio::test]
    async fn end_to_end_trims_and_replies_once() {
        let messenger = Arc::new(FakeMessenger::default());
        let completions = Arc::new(ScriptedCompletion::ok("  Sorry, I'm busy.  "));
        let p = pipeline(completions.clone());

        let msg = message(messenger.clone(), "555111@c.us", "are you free tonight?");
        let sent = p.handle_message(&msg).await.unwrap();
        assert_eq!(sent, "Sorry, I'm busy.");

        let reqs = completions.requests();
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].model, "gpt-3.5-turbo");
        assert_eq!(reqs[0].messages.len(), 1);
        assert_eq!(reqs[0].messages[0].role, ChatRole::System);
        assert_eq!(
            reqs[0].messages[0].content,
            "Reply on my behalf to the sender's 555111 message: \"are you free tonight?\""
        );

        let replies = messenger.replies();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].0.chat_id, "555111@c.us");
        assert_eq!(replies[0].1, "Sorry, I'm busy.");
    }

    #[tokio::test]
    async fn plain_identifier_replies_with_fixed_text() {
        let messenger = Arc::new(FakeMessenger::default());
        let completions = Arc::new(ScriptedCompletion::ok("hi there"));
        let p = pipeline(completions.clone());

        let msg = message(messenger.clone(), "1234567890", "hello");
        p.handle_message(&msg).await.unwrap();

        assert!(completions.requests()[0].messages[0]
            .content
            .contains("sender's 1234567890 message: \"hello\""));
        assert_eq!(messenger.replies().len(), 1);
        assert_eq!(messenger.replies()[0].1, "hi there");
    }

    #[tokio::test]
    async fn completion_failure_sends_nothing_and_handler_returns_ok() {
        let messenger = Arc::new(FakeMessenger::default());
        let completions = Arc::new(ScriptedCompletion::failing());
        let p = pipeline(completions.clone());

        let msg = message(messenger.clone(), "555111@c.us", "hello");
        let err = p.handle_message(&msg).await.unwrap_err();
        assert!(matches!(err, Error::Completion(_)));

        p.handle(&ConnectorEvent::Message(msg)).await.unwrap();

        assert_eq!(completions.requests().len(), 2);
        assert!(messenger.replies().is_empty());
        assert!(p.history().recent("555111").await.is_empty());
    }

    #[tokio::test]
    async fn empty_or_missing_choice_is_a_completion_error() {
        for choices in [vec![], vec!["   \n".to_string()]] {
            let messenger = Arc::new(FakeMessenger::default());
            let p = pipeline(Arc::new(ScriptedCompletion::choices(choices)));

            let msg = message(messenger.clone(), "1@c.us", "hello");
            let err = p.handle_message(&msg).await.unwrap_err();
            assert!(matches!(err, Error::Completion(_)));
            assert!(messenger.replies().is_empty());
        }
    }

    #[tokio::test]
    async fn only_first_choice_is_used() {
        let messenger = Arc::new(FakeMessenger::default());
        let p = pipeline(Arc::new(ScriptedCompletion::choices(vec![
            "first".to_string(),
            "second".to_string(),
        ])));

        let msg = message(messenger.clone(), "1@c.us", "hello");
        assert_eq!(p.handle_message(&msg).await.unwrap(), "first");
        assert_eq!(messenger.replies().len(), 1);
    }

    #[tokio::test]
    async fn same_message_twice_is_not_deduplicated() {
        let messenger = Arc::new(FakeMessenger::default());
        let completions = Arc::new(ScriptedCompletion::ok("ok"));
        let p = pipeline(completions.clone());

        let msg = message(messenger.clone(), "7@c.us", "ping");
        p.handle(&ConnectorEvent::Message(msg.clone())).await.unwrap();
        p.handle(&ConnectorEvent::Message(msg)).await.unwrap();

        assert_eq!(completions.requests().len(), 2);
        assert_eq!(messenger.replies().len(), 2);
        assert_eq!(p.history().recent("7").await.len(), 2);
    }

    #[tokio::test]
    async fn reply_failure_is_a_messaging_error_and_not_recorded() {
        let messenger = Arc::new(FakeMessenger {
            fail: true,
            ..FakeMessenger::default()
        });
        let p = pipeline(Arc::new(ScriptedCompletion::ok("ok")));

        let msg = message(messenger, "7@c.us", "ping");
        let err = p.handle_message(&msg).await.unwrap_err();
        assert!(matches!(err, Error::Messaging(_)));
        assert!(p.history().recent("7").await.is_empty());
    }

    #[tokio::test]
    async fn non_message_events_are_ignored() {
        let completions = Arc::new(ScriptedCompletion::ok("ok"));
        let p = pipeline(completions.clone());

        p.handle(&ConnectorEvent::Ready).await.unwrap();
        assert!(completions.requests().is_empty());
    }
}
