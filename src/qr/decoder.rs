//! Code decoder: QR through rqrr, linear barcodes through rxing

use crate::error::{Error, Result};
use crate::qr::QrPayload;
use image::{DynamicImage, GrayImage};

/// Decoder for QR codes and 1D product barcodes (EAN/UPC, Code 128, ...)
#[derive(Debug, Default, Clone, Copy)]
pub struct QrDecoder;

impl QrDecoder {
    /// Create a new decoder with default settings
    pub fn new() -> Self {
        Self
    }

    /// Decode the first code found in an image.
    ///
    /// QR grids are tried first; frames without one are searched for a linear barcode.
    pub fn decode(&self, img: &DynamicImage) -> Result<QrPayload> {
        let gray = img.to_luma8();
        match self.decode_gray(gray.clone()) {
            Err(Error::NoQrCodeFound) => self.decode_linear(gray),
            other => other,
        }
    }

    /// Decode the first QR code found in a grayscale image
    pub fn decode_gray(&self, img: GrayImage) -> Result<QrPayload> {
        let mut prepared = rqrr::PreparedImage::prepare(img);
        let grids = prepared.detect_grids();

        let grid = grids.first().ok_or(Error::NoQrCodeFound)?;

        // rqrr only hands out String content; collect raw bytes for binary codes
        let mut data = Vec::new();
        match grid.decode_to(&mut data) {
            Ok(meta) => {
                tracing::debug!(
                    "Decoded QR: version={:?}, ecc_level={:?}, length={}",
                    meta.version,
                    meta.ecc_level,
                    data.len()
                );
                Ok(QrPayload::from_bytes(data))
            }
            Err(e) => Err(Error::QrDecode(format!("{:?}", e))),
        }
    }

    /// Decode a 1D barcode from a grayscale image
    pub fn decode_linear(&self, img: GrayImage) -> Result<QrPayload> {
        let (width, height) = img.dimensions();
        match rxing::helpers::detect_in_luma(img.into_raw(), width, height, None) {
            Ok(found) => {
                tracing::debug!(
                    "Decoded barcode: format={:?}, length={}",
                    found.getBarcodeFormat(),
                    found.getText().len()
                );
                Ok(QrPayload::from_bytes(found.getText().as_bytes().to_vec()))
            }
            Err(err) => {
                tracing::trace!("No linear barcode in frame: {err:?}");
                Err(Error::NoQrCodeFound)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_blank_frame_has_no_code() {
        let blank = GrayImage::from_pixel(64, 64, Luma([255u8]));
        assert!(matches!(
            QrDecoder::new().decode_gray(blank),
            Err(Error::NoQrCodeFound)
        ));
    }

    const L_CODES: [&str; 10] = [
        "0001101", "0011001", "0010011", "0111101", "0100011", "0110001", "0101111", "0111011",
        "0110111", "0001011",
    ];
    const G_CODES: [&str; 10] = [
        "0100111", "0110011", "0011011", "0100001", "0011101", "0111001", "0000101", "0010001",
        "0001001", "0010111",
    ];
    const R_CODES: [&str; 10] = [
        "1110010", "1100110", "1101100", "1000010", "1011100", "1001110", "1010000", "1000100",
        "1001000", "1110100",
    ];
    const PARITY: [&str; 10] = [
        "LLLLLL", "LLGLGG", "LLGGLG", "LLGGGL", "LGLLGG", "LGGLLG", "LGGGLL", "LGLGLG", "LGLGGL",
        "LGGLGL",
    ];

    /// Render a 13-digit EAN-13 symbol, 3px per module with a 10-module quiet zone.
    fn ean13_frame(digits: &str) -> GrayImage {
        let digits: Vec<usize> = digits
            .chars()
            .map(|c| c.to_digit(10).expect("digit") as usize)
            .collect();
        assert_eq!(digits.len(), 13);

        let mut modules = String::from("101");
        for (i, parity) in PARITY[digits[0]].chars().enumerate() {
            let table = if parity == 'L' { &L_CODES } else { &G_CODES };
            modules.push_str(table[digits[i + 1]]);
        }
        modules.push_str("01010");
        for digit in &digits[7..] {
            modules.push_str(R_CODES[*digit]);
        }
        modules.push_str("101");

        let scale = 3;
        let quiet = 10 * scale;
        let width = modules.len() as u32 * scale + 2 * quiet;
        let mut img = GrayImage::from_pixel(width, 80, Luma([255u8]));
        for (m, bit) in modules.chars().enumerate() {
            if bit == '1' {
                for dx in 0..scale {
                    let x = quiet + m as u32 * scale + dx;
                    for y in 10..70 {
                        img.put_pixel(x, y, Luma([0u8]));
                    }
                }
            }
        }
        img
    }

    #[test]
    fn test_decodes_ean13_barcode() {
        let frame = DynamicImage::ImageLuma8(ean13_frame("4006381333931"));
        let payload = QrDecoder::new().decode(&frame).expect("decode");
        assert_eq!(payload.as_str(), Some("4006381333931"));
    }

    #[test]
    fn test_blank_frame_has_no_barcode() {
        let blank = GrayImage::from_pixel(200, 80, Luma([255u8]));
        assert!(matches!(
            QrDecoder::new().decode(&DynamicImage::ImageLuma8(blank)),
            Err(Error::NoQrCodeFound)
        ));
    }

    #[test]
    fn test_decodes_generated_code() {
        let code = qrcode::QrCode::new(b"ABC123").expect("encode");
        let img = code.render::<Luma<u8>>().min_dimensions(200, 200).build();

        let payload = QrDecoder::new()
            .decode(&DynamicImage::ImageLuma8(img))
            .expect("decode");
        assert_eq!(payload.as_str(), Some("ABC123"));
    }
}
