//! QR code and barcode decoding
//!
//! Turns camera frames into payloads: QR grids with `rqrr`, linear product
//! barcodes (EAN/UPC, Code 128, ...) with `rxing`. Frames without a code are
//! reported as [`Error::NoQrCodeFound`](crate::Error::NoQrCodeFound) so callers
//! can tell "nothing there" apart from a damaged code.

mod decoder;

pub use decoder::QrDecoder;

use serde::{Deserialize, Serialize};

/// A decoded QR code payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrPayload {
    /// The raw decoded data
    pub data: Vec<u8>,
    /// String representation if valid UTF-8
    pub text: Option<String>,
}

impl QrPayload {
    /// Create a new QR payload from raw bytes
    pub fn from_bytes(data: Vec<u8>) -> Self {
        let text = String::from_utf8(data.clone()).ok();
        Self { data, text }
    }

    /// Get the payload as a string, if valid UTF-8
    pub fn as_str(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Text for display, replacing invalid UTF-8 sequences
    pub fn to_text_lossy(&self) -> String {
        match &self.text {
            Some(text) => text.clone(),
            None => String::from_utf8_lossy(&self.data).into_owned(),
        }
    }
}
