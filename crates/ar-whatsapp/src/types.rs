//! Bridge wire protocol: JSON text frames tagged by `type`.

use serde::{Deserialize, Serialize};

/// Frames we send to the bridge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayFrame {
    /// Restore the stored session for `account_id`, or start pairing.
    Login {
        account_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        auth_dir: Option<String>,
    },
    Reply {
        request_id: String,
        account_id: String,
        chat_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        quoted_message_id: Option<String>,
        text: String,
    },
}

/// Frames the bridge sends to us.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeFrame {
    Qr {
        account_id: String,
        qr: String,
    },
    Connected {
        account_id: String,
        #[serde(default)]
        phone_number: Option<String>,
    },
    Disconnected {
        account_id: String,
        #[serde(default)]
        reason: Option<String>,
    },
    InboundMessage {
        account_id: String,
        message_id: String,
        /// Raw sender address, e.g. `555111@c.us`.
        from: String,
        #[serde(default)]
        body: String,
    },
    SendResult {
        request_id: String,
        success: bool,
        #[serde(default)]
        error: Option<String>,
    },
    Error {
        #[serde(default)]
        account_id: Option<String>,
        error: String,
    },
    #[serde(other)]
    Unknown,
}

impl BridgeFrame {
    /// Account the frame belongs to, if it names one.
    pub fn account_id(&self) -> Option<&str> {
        match self {
            BridgeFrame::Qr { account_id, .. }
            | BridgeFrame::Connected { account_id, .. }
            | BridgeFrame::Disconnected { account_id, .. }
            | BridgeFrame::InboundMessage { account_id, .. } => Some(account_id),
            BridgeFrame::Error { account_id, .. } => account_id.as_deref(),
            BridgeFrame::SendResult { .. } | BridgeFrame::Unknown => None,
        }
    }
}
