use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use ar_core::{
    config::WhatsAppConfig,
    domain::{InboundMessage, ReplyHandle, ReplyTarget},
    errors::Error,
    events::ConnectorEvent,
    messaging::connector::SessionConnector,
    Result,
};

use crate::{
    outbound::WhatsAppMessenger,
    types::{BridgeFrame, GatewayFrame},
};

/// Session connector backed by a WhatsApp Web bridge.
///
/// One WebSocket connection per `run`. There is no reconnect: when the bridge
/// goes away an `Error` event is emitted and `run` returns.
pub struct WhatsAppConnector {
    cfg: WhatsAppConfig,
}

impl WhatsAppConnector {
    pub fn new(cfg: WhatsAppConfig) -> Self {
        Self { cfg }
    }
}

#[async_trait]
impl SessionConnector for WhatsAppConnector {
    fn name(&self) -> &'static str {
        "whatsapp"
    }

    async fn run(&self, events: mpsc::Sender<ConnectorEvent>) -> Result<()> {
        info!(url = %self.cfg.bridge_url, account_id = %self.cfg.account_id, "connecting to whatsapp bridge");
        let (ws_stream, _response) = connect_async(self.cfg.bridge_url.as_str())
            .await
            .map_err(|e| Error::Connector(format!("whatsapp bridge connect failed: {e}")))?;
        let (mut ws_sink, mut ws_reader) = ws_stream.split();

        let (write_tx, mut write_rx) = mpsc::unbounded_channel::<GatewayFrame>();
        let messenger = Arc::new(WhatsAppMessenger::new(
            self.cfg.account_id.clone(),
            write_tx.clone(),
        ));

        let login = GatewayFrame::Login {
            account_id: self.cfg.account_id.clone(),
            auth_dir: self
                .cfg
                .auth_dir
                .as_ref()
                .map(|p| p.display().to_string()),
        };
        // Receiver is alive until this function returns.
        let _ = write_tx.send(login);
        drop(write_tx);

        loop {
            tokio::select! {
                Some(frame) = write_rx.recv() => {
                    let json = serde_json::to_string(&frame)?;
                    if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                        let _ = events
                            .send(ConnectorEvent::Error {
                                message: format!("whatsapp bridge write failed: {e}"),
                            })
                            .await;
                        break;
                    }
                }
                msg = ws_reader.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let Some(event) = parse_frame(text.as_str(), &self.cfg.account_id, &messenger) else {
                                continue;
                            };
                            if events.send(event).await.is_err() {
                                debug!("event receiver dropped, stopping whatsapp connector");
                                break;
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            let _ = ws_sink.send(Message::Pong(data)).await;
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            let _ = events
                                .send(ConnectorEvent::Error {
                                    message: "whatsapp bridge closed the connection".to_string(),
                                })
                                .await;
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            let _ = events
                                .send(ConnectorEvent::Error {
                                    message: format!("whatsapp bridge read failed: {e}"),
                                })
                                .await;
                            break;
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

/// Decode one text frame into the event it stands for, if any.
fn parse_frame(
    text: &str,
    account_id: &str,
    messenger: &Arc<WhatsAppMessenger>,
) -> Option<ConnectorEvent> {
    match serde_json::from_str::<BridgeFrame>(text) {
        Ok(frame) => to_event(frame, account_id, messenger),
        Err(e) => {
            warn!(error = %e, "unreadable whatsapp bridge frame");
            None
        }
    }
}

fn to_event(
    frame: BridgeFrame,
    account_id: &str,
    messenger: &Arc<WhatsAppMessenger>,
) -> Option<ConnectorEvent> {
    if let Some(other) = frame.account_id() {
        if other != account_id {
            debug!(account_id = other, "frame for another account");
            return None;
        }
    }

    match frame {
        BridgeFrame::Qr { qr, .. } => Some(ConnectorEvent::Pairing { code: qr }),
        BridgeFrame::Connected { phone_number, .. } => {
            info!(?phone_number, "whatsapp web connected");
            Some(ConnectorEvent::Ready)
        }
        BridgeFrame::Disconnected { reason, .. } => Some(ConnectorEvent::Error {
            message: format!(
                "whatsapp web disconnected: {}",
                reason.as_deref().unwrap_or("unknown reason")
            ),
        }),
        BridgeFrame::InboundMessage {
            message_id,
            from,
            body,
            ..
        } => {
            let target = ReplyTarget {
                chat_id: from.clone(),
                message_id: Some(message_id),
            };
            let handle = ReplyHandle::new(messenger.clone(), target);
            Some(ConnectorEvent::Message(InboundMessage::new(from, body, handle)))
        }
        BridgeFrame::SendResult {
            request_id,
            success,
            error,
        } => {
            if success {
                debug!(request_id, "reply delivered");
            } else {
                warn!(request_id, ?error, "bridge failed to deliver reply");
            }
            None
        }
        BridgeFrame::Error { error, .. } => Some(ConnectorEvent::Error { message: error }),
        BridgeFrame::Unknown => {
            debug!("ignoring unknown whatsapp bridge frame");
            None
        }
    }
}
