//! WhatsApp Web adapter.
//!
//! Talks to a WhatsApp Web bridge (a sidecar process that owns the browser
//! session and its local auth storage) over a JSON/WebSocket protocol, and
//! exposes it as an `ar-core` `SessionConnector` + `MessagingPort`.

pub mod connector;
pub mod outbound;
pub mod pairing;
pub mod types;

pub use {
    connector::WhatsAppConnector,
    outbound::WhatsAppMessenger,
    pairing::{render_pairing_code, PairingPrinter},
};
