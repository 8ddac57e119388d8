//! Messenger-facing ports (WhatsApp today; Telegram as an alternative).

pub mod connector;
pub mod port;
