use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use ar_core::{
    config::{Config, ConnectorKind},
    events::{EventKind, EventRouter, LifecycleLogger, EVENT_CHANNEL_CAPACITY},
    history::ConversationLog,
    messaging::connector::SessionConnector,
    pipeline::ReplyPipeline,
    Error,
};
use ar_openai::OpenAiClient;
use ar_telegram::TelegramConnector;
use ar_whatsapp::{PairingPrinter, WhatsAppConnector};

#[tokio::main]
async fn main() -> Result<(), Error> {
    ar_core::logging::init("autoreply")?;

    let cfg = Config::load()?;

    let completions = Arc::new(OpenAiClient::from_config(&cfg)?);
    let pipeline = Arc::new(ReplyPipeline::new(
        cfg.openai_model.clone(),
        completions,
        Arc::new(ConversationLog::new(cfg.history_limit)),
    ));

    let connector: Box<dyn SessionConnector> = match cfg.connector {
        ConnectorKind::WhatsApp => Box::new(WhatsAppConnector::new(cfg.whatsapp.clone())),
        ConnectorKind::Telegram => {
            let tg = cfg
                .telegram
                .as_ref()
                .ok_or_else(|| Error::Config("TELEGRAM_BOT_TOKEN is required".to_string()))?;
            Box::new(TelegramConnector::new(tg))
        }
    };

    let lifecycle = Arc::new(LifecycleLogger);
    let router = Arc::new(
        EventRouter::new()
            .on(EventKind::Ready, lifecycle.clone())
            .on(EventKind::Error, lifecycle.clone())
            .on(EventKind::Pairing, lifecycle)
            .on(EventKind::Pairing, Arc::new(PairingPrinter))
            .on(EventKind::Message, pipeline.clone()),
    );

    info!(
        connector = connector.name(),
        model = %pipeline.model(),
        history_limit = pipeline.history().limit(),
        "autoreply starting"
    );

    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let routing = tokio::spawn(router.run(rx));

    tokio::select! {
        res = connector.run(tx) => {
            res?;
            // Connector ended; let in-flight handlers drain.
            if let Err(e) = routing.await {
                warn!(error = %e, "event router task failed");
            }
            info!("session ended");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, shutting down");
        }
    }

    Ok(())
}
