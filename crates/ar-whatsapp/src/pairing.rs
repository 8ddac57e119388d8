use async_trait::async_trait;
use qrcode::{render::unicode, QrCode};
use tracing::warn;

use ar_core::{
    events::{ConnectorEvent, EventHandler},
    Result,
};

/// Render a pairing code as a compact QR for the terminal.
///
/// Falls back to the raw code when it cannot be encoded.
pub fn render_pairing_code(code: &str) -> String {
    match QrCode::new(code.as_bytes()) {
        Ok(qr) => qr
            .render::<unicode::Dense1x2>()
            .dark_color(unicode::Dense1x2::Light)
            .light_color(unicode::Dense1x2::Dark)
            .build(),
        Err(e) => {
            warn!(error = %e, "pairing code cannot be rendered as QR");
            code.to_string()
        }
    }
}

/// Prints pairing codes to stdout so they can be scanned from the phone.
#[derive(Clone, Copy, Debug, Default)]
pub struct PairingPrinter;

#[async_trait]
impl EventHandler for PairingPrinter {
    async fn handle(&self, event: &ConnectorEvent) -> Result<()> {
        if let ConnectorEvent::Pairing { code } = event {
            println!("{}", render_pairing_code(code));
        }
        Ok(())
    }
}
