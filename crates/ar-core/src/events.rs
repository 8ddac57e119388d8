//! Typed connector events and handler registration.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::{sync::mpsc, task::JoinSet};
use tracing::{debug, error, info};

use crate::{domain::InboundMessage, Result};

/// Capacity of the channel between a connector and the router.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Everything a session connector can report.
#[derive(Clone, Debug)]
pub enum ConnectorEvent {
    /// Session is authenticated and delivering messages.
    Ready,
    /// Session needs pairing; `code` is the payload to show the user.
    Pairing { code: String },
    Message(InboundMessage),
    Error { message: String },
}

impl ConnectorEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ConnectorEvent::Ready => EventKind::Ready,
            ConnectorEvent::Pairing { .. } => EventKind::Pairing,
            ConnectorEvent::Message(_) => EventKind::Message,
            ConnectorEvent::Error { .. } => EventKind::Error,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Ready,
    Pairing,
    Message,
    Error,
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &ConnectorEvent) -> Result<()>;
}

/// Routes connector events to the handlers registered for their kind.
///
/// Message events run on their own tasks, so a slow completion never holds
/// up the next message. Lifecycle events run inline, in arrival order.
#[derive(Default)]
pub struct EventRouter {
    handlers: HashMap<EventKind, Vec<Arc<dyn EventHandler>>>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, kind: EventKind, handler: Arc<dyn EventHandler>) -> Self {
        self.handlers.entry(kind).or_default().push(handler);
        self
    }

    #[cfg(test)]
    pub(crate) fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map(Vec::len).unwrap_or(0)
    }

    /// Run every handler for `event`. Handler errors are logged, not returned.
    pub async fn dispatch(&self, event: &ConnectorEvent) {
        let kind = event.kind();
        let Some(handlers) = self.handlers.get(&kind) else {
            debug!(?kind, "no handler registered");
            return;
        };
        for handler in handlers {
            if let Err(e) = handler.handle(event).await {
                error!(?kind, error = %e, "event handler failed");
            }
        }
    }

    /// Drain `events` until the connector drops its sender, then wait for
    /// in-flight message handlers.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<ConnectorEvent>) {
        let mut in_flight = JoinSet::new();

        while let Some(event) = events.recv().await {
            match event.kind() {
                EventKind::Message => {
                    let router = self.clone();
                    in_flight.spawn(async move { router.dispatch(&event).await });
                }
                _ => self.dispatch(&event).await,
            }

            while let Some(done) = in_flight.try_join_next() {
                if let Err(e) = done {
                    error!(error = %e, "message task aborted");
                }
            }
        }

        while let Some(done) = in_flight.join_next().await {
            if let Err(e) = done {
                error!(error = %e, "message task aborted");
            }
        }
    }
}

/// Logs session lifecycle events.
#[derive(Clone, Copy, Debug, Default)]
pub struct LifecycleLogger;

#[async_trait]
impl EventHandler for LifecycleLogger {
    async fn handle(&self, event: &ConnectorEvent) -> Result<()> {
        match event {
            ConnectorEvent::Ready => info!("client is ready"),
            ConnectorEvent::Pairing { .. } => info!("pairing requested, scan the code"),
            ConnectorEvent::Error { message } => error!(error = %message, "session error"),
            ConnectorEvent::Message(_) => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Mutex, time::Duration};

    use tokio::{sync::Notify, time::timeout};

    use super::*;
    use crate::{
        domain::{ReplyHandle, ReplyTarget},
        errors::Error,
        messaging::port::MessagingPort,
    };

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<EventKind>>,
        fail: bool,
    }

    impl Recorder {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn seen(&self) -> Vec<EventKind> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventHandler for Recorder {
        async fn handle(&self, event: &ConnectorEvent) -> Result<()> {
            self.seen.lock().unwrap().push(event.kind());
            if self.fail {
                return Err(Error::External("boom".to_string()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn dispatches_only_to_registered_kind() {
        let ready = Arc::new(Recorder::default());
        let errors = Arc::new(Recorder::default());
        let router = EventRouter::new()
            .on(EventKind::Ready, ready.clone())
            .on(EventKind::Error, errors.clone());

        router.dispatch(&ConnectorEvent::Ready).await;
        router
            .dispatch(&ConnectorEvent::Pairing {
                code: "x".to_string(),
            })
            .await;

        assert_eq!(ready.seen(), vec![EventKind::Ready]);
        assert!(errors.seen().is_empty());
    }

    #[tokio::test]
    async fn failing_handler_does_not_stop_the_next_one() {
        let first = Arc::new(Recorder::failing());
        let second = Arc::new(Recorder::default());
        let router = EventRouter::new()
            .on(EventKind::Error, first.clone())
            .on(EventKind::Error, second.clone());

        router
            .dispatch(&ConnectorEvent::Error {
                message: "lost".to_string(),
            })
            .await;

        assert_eq!(first.seen(), vec![EventKind::Error]);
        assert_eq!(second.seen(), vec![EventKind::Error]);
        assert_eq!(router.handler_count(EventKind::Error), 2);
        assert_eq!(router.handler_count(EventKind::Message), 0);
    }

    #[tokio::test]
    async fn run_returns_when_sender_is_dropped() {
        let rec = Arc::new(Recorder::default());
        let router = Arc::new(
            EventRouter::new()
                .on(EventKind::Ready, rec.clone())
                .on(EventKind::Error, rec.clone()),
        );

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        tx.send(ConnectorEvent::Ready).await.unwrap();
        tx.send(ConnectorEvent::Error {
            message: "closed".to_string(),
        })
        .await
        .unwrap();
        drop(tx);

        router.run(rx).await;
        assert_eq!(rec.seen(), vec![EventKind::Ready, EventKind::Error]);
    }

    struct NullMessenger;

    #[async_trait]
    impl MessagingPort for NullMessenger {
        fn name(&self) -> &'static str {
            "null"
        }

        async fn reply(&self, _target: &ReplyTarget, _text: &str) -> Result<()> {
            Ok(())
        }
    }

    fn message(body: &str) -> ConnectorEvent {
        let handle = ReplyHandle::new(
            Arc::new(NullMessenger),
            ReplyTarget {
                chat_id: "555111@c.us".to_string(),
                message_id: None,
            },
        );
        ConnectorEvent::Message(InboundMessage::new("555111@c.us", body, handle))
    }

    /// Holds "slow" until released; records bodies as they finish.
    #[derive(Default)]
    struct Gated {
        release: Notify,
        quick_done: Notify,
        finished: Mutex<Vec<String>>,
    }

    impl Gated {
        fn finished(&self) -> Vec<String> {
            self.finished.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventHandler for Gated {
        async fn handle(&self, event: &ConnectorEvent) -> Result<()> {
            let ConnectorEvent::Message(msg) = event else {
                return Ok(());
            };
            if msg.body == "slow" {
                self.release.notified().await;
            }
            self.finished.lock().unwrap().push(msg.body.clone());
            if msg.body == "quick" {
                self.quick_done.notify_one();
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn pending_message_does_not_block_the_next_one() {
        let gated = Arc::new(Gated::default());
        let router = Arc::new(EventRouter::new().on(EventKind::Message, gated.clone()));

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let running = tokio::spawn(router.run(rx));

        tx.send(message("slow")).await.unwrap();
        tx.send(message("quick")).await.unwrap();

        timeout(Duration::from_secs(5), gated.quick_done.notified())
            .await
            .expect("second message handled while the first is pending");
        assert_eq!(gated.finished(), vec!["quick"]);

        // Sender gone, but "slow" is still in flight: run must wait for it.
        drop(tx);
        tokio::task::yield_now().await;
        assert!(!running.is_finished());

        gated.release.notify_one();
        timeout(Duration::from_secs(5), running)
            .await
            .expect("run returns once in-flight messages drain")
            .unwrap();
        assert_eq!(gated.finished(), vec!["quick", "slow"]);
    }
}
