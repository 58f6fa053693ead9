//! Camera configuration

use serde::{Deserialize, Serialize};

/// Camera configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Camera device index (e.g., 0 for /dev/video0).
    /// If None, the first available capture device is used.
    pub device_index: Option<usize>,

    /// Camera device name to search for; takes priority over `device_index`
    pub device_name: Option<String>,

    /// Frame width in pixels
    pub width: u32,

    /// Frame height in pixels
    pub height: u32,

    /// Frames per second
    pub fps: u32,

    /// Pixel format
    pub format: PixelFormat,

    /// Number of V4L2 buffers to keep mapped
    pub buffer_count: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        // 720p keeps 1D barcodes legible without making decoding crawl
        Self {
            device_index: None,
            device_name: None,
            width: 1280,
            height: 720,
            fps: 30,
            format: PixelFormat::Mjpeg,
            buffer_count: 4,
        }
    }
}

impl CameraConfig {
    /// Preset for older webcams that only stream uncompressed frames
    pub fn compatible() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 15,
            format: PixelFormat::Yuyv,
            ..Default::default()
        }
    }
}

/// Pixel format for camera capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// Motion JPEG (compressed, recommended for high resolution)
    Mjpeg,
    /// YUYV 4:2:2 (uncompressed, better compatibility)
    Yuyv,
    /// RGB24 (uncompressed, high bandwidth)
    Rgb24,
}

impl PixelFormat {
    /// Convert to V4L2 FourCC code
    pub fn to_fourcc(self) -> v4l::FourCC {
        match self {
            PixelFormat::Mjpeg => v4l::FourCC::new(b"MJPG"),
            PixelFormat::Yuyv => v4l::FourCC::new(b"YUYV"),
            PixelFormat::Rgb24 => v4l::FourCC::new(b"RGB3"),
        }
    }

    /// Parse from a user-provided string (case-insensitive)
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mjpeg" | "mjpg" => Some(PixelFormat::Mjpeg),
            "yuyv" => Some(PixelFormat::Yuyv),
            "rgb" | "rgb24" => Some(PixelFormat::Rgb24),
            _ => None,
        }
    }
}
