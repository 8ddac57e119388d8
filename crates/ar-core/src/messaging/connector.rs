use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{events::ConnectorEvent, Result};

/// Inbound side of a messenger: owns the session and turns what happens on it
/// into typed events.
///
/// `run` returns when the session ends. An error return means the session
/// could not be established at all; failures after that are reported as
/// `ConnectorEvent::Error`.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, events: mpsc::Sender<ConnectorEvent>) -> Result<()>;
}
