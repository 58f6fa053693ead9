//! Error types for qscan operations

use thiserror::Error;

/// Result type alias using qscan's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for qscan operations
#[derive(Error, Debug)]
pub enum Error {
    /// Camera-related errors
    #[error("Camera error: {0}")]
    Camera(String),

    /// Camera device not found
    #[error("Camera device not found: {0}")]
    CameraNotFound(String),

    /// The process is not allowed to open the camera device
    #[error("Camera permission denied: {0}")]
    PermissionDenied(String),

    /// Failed to capture frame from camera
    #[error("Frame capture failed: {0}")]
    FrameCapture(String),

    /// QR code decoding failed
    #[error("Failed to decode QR code: {0}")]
    QrDecode(String),

    /// No QR code found in frame
    #[error("No QR code found in frame")]
    NoQrCodeFound,

    /// Frame source could not be opened or ran dry
    #[error("Frame source error: {0}")]
    Source(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image processing error
    #[error("Image processing error: {0}")]
    Image(String),

    /// Audio playback error
    #[error("Audio error: {0}")]
    Audio(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for errors that mean the frame source itself is unusable
    /// (as opposed to a single frame without a readable code).
    pub fn is_device_failure(&self) -> bool {
        matches!(
            self,
            Error::Camera(_)
                | Error::CameraNotFound(_)
                | Error::PermissionDenied(_)
                | Error::FrameCapture(_)
                | Error::Source(_)
                | Error::Io(_)
        )
    }
}

impl From<image::ImageError> for Error {
    fn from(e: image::ImageError) -> Self {
        Error::Image(e.to_string())
    }
}

// V4L errors are converted manually in camera module

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Other(format!("JSON error: {}", e))
    }
}
