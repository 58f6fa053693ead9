//! Camera device implementation

use crate::camera::{CameraConfig, PixelFormat, find_device_by_name, list_devices, open_error};
use crate::error::{Error, Result};
use crate::source::{FrameSource, FrameSourceProvider};
use async_trait::async_trait;
use image::{DynamicImage, ImageBuffer};
use serde::{Deserialize, Serialize};
use std::mem;
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

/// Information about a camera device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraDevice {
    /// Device index (e.g., 0 for /dev/video0)
    pub index: usize,
    /// Device path (e.g., "/dev/video0")
    pub path: String,
    /// Device name as reported by the driver
    pub name: String,
    /// Driver name
    pub driver: String,
    /// Bus information
    pub bus_info: String,
}

/// An open, streaming camera.
///
/// Dropping it unmaps the buffers and closes the device node, which is how a scan
/// session releases the camera.
pub struct Camera {
    /// Memory-mapped V4L2 stream kept warm between captures.
    /// Declared before `_device` so it is dropped first.
    stream: MmapStream<'static>,
    _device: Box<Device>,
    config: CameraConfig,
    info: CameraDevice,
}

impl Camera {
    /// Open a camera with the given configuration
    pub async fn open(config: CameraConfig) -> Result<Self> {
        let device_info = resolve_device(&config)?;

        tracing::info!(
            "Opening camera: {} at {}",
            device_info.name,
            device_info.path
        );

        let dev = Device::new(device_info.index).map_err(|e| open_error(&device_info.path, e))?;

        let mut fmt = dev
            .format()
            .map_err(|e| Error::Camera(format!("Failed to get format: {}", e)))?;
        fmt.width = config.width;
        fmt.height = config.height;
        fmt.fourcc = config.format.to_fourcc();

        // Drivers may pick the nearest supported mode; keep what they chose
        let fmt = dev
            .set_format(&fmt)
            .map_err(|e| Error::Camera(format!("Failed to set format: {}", e)))?;
        if fmt.fourcc != config.format.to_fourcc() {
            return Err(Error::Camera(format!(
                "{} does not support {:?} capture",
                device_info.path, config.format
            )));
        }

        let mut params = dev
            .params()
            .map_err(|e| Error::Camera(format!("Failed to get params: {}", e)))?;
        params.interval = v4l::Fraction::new(1, config.fps.max(1));
        dev.set_params(&params)
            .map_err(|e| Error::Camera(format!("Failed to set params: {}", e)))?;

        tracing::info!(
            "Camera configured: {}x{} @ {} fps ({})",
            fmt.width,
            fmt.height,
            config.fps,
            String::from_utf8_lossy(&fmt.fourcc.repr)
        );

        // SAFETY: the boxed device lives in the same struct as the stream and is
        // dropped after it, so the extended borrow never dangles.
        let device = Box::new(dev);
        let static_device: &'static Device =
            unsafe { mem::transmute::<&Device, &'static Device>(device.as_ref()) };

        let stream = MmapStream::with_buffers(
            static_device,
            Type::VideoCapture,
            config.buffer_count.max(2),
        )
        .map_err(|e| Error::FrameCapture(format!("Failed to create stream: {}", e)))?;

        let config = CameraConfig {
            width: fmt.width,
            height: fmt.height,
            ..config
        };

        Ok(Self {
            stream,
            _device: device,
            config,
            info: device_info,
        })
    }

    /// Get camera device information
    pub fn info(&self) -> &CameraDevice {
        &self.info
    }

    /// Get the negotiated camera configuration
    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    /// Capture a single frame
    pub fn capture_frame(&mut self) -> Result<DynamicImage> {
        let (buf, meta) = self
            .stream
            .next()
            .map_err(|e| Error::FrameCapture(format!("Failed to capture: {}", e)))?;

        let used = (meta.bytesused as usize).min(buf.len());
        let payload = if used == 0 { buf } else { &buf[..used] };

        decode_frame(&self.config, payload)
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        tracing::debug!("Releasing camera {}", self.info.path);
    }
}

#[async_trait]
impl FrameSource for Camera {
    async fn next_frame(&mut self) -> Result<DynamicImage> {
        self.capture_frame()
    }

    fn describe(&self) -> String {
        format!("{} ({})", self.info.name, self.info.path)
    }
}

/// Opens the configured camera each time a scan session starts.
#[derive(Debug, Clone, Default)]
pub struct CameraProvider {
    config: CameraConfig,
}

impl CameraProvider {
    /// Create a provider for the given camera configuration
    pub fn new(config: CameraConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl FrameSourceProvider for CameraProvider {
    async fn open(&self) -> Result<Box<dyn FrameSource>> {
        let camera = Camera::open(self.config.clone()).await?;
        Ok(Box::new(camera))
    }

    fn label(&self) -> String {
        match (&self.config.device_name, self.config.device_index) {
            (Some(name), _) => format!("camera '{}'", name),
            (None, Some(index)) => format!("camera /dev/video{}", index),
            (None, None) => "default camera".to_string(),
        }
    }
}

fn resolve_device(config: &CameraConfig) -> Result<CameraDevice> {
    if let Some(ref name) = config.device_name {
        return find_device_by_name(name);
    }

    let mut devices = list_devices()?.into_iter();
    match config.device_index {
        Some(index) => devices.find(|d| d.index == index).ok_or_else(|| {
            Error::CameraNotFound(format!("Device /dev/video{} not found", index))
        }),
        None => devices
            .next()
            .ok_or_else(|| Error::CameraNotFound("No cameras available".to_string())),
    }
}

/// Decode a raw frame buffer according to the negotiated pixel format.
fn decode_frame(config: &CameraConfig, buf: &[u8]) -> Result<DynamicImage> {
    match config.format {
        PixelFormat::Mjpeg => image::load_from_memory_with_format(buf, image::ImageFormat::Jpeg)
            .map_err(|e| Error::Image(format!("MJPEG decode failed: {}", e))),
        PixelFormat::Yuyv => yuyv_to_rgb(config.width, config.height, buf),
        PixelFormat::Rgb24 => ImageBuffer::from_raw(config.width, config.height, buf.to_vec())
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| Error::Image("RGB24 frame shorter than expected".to_string())),
    }
}

/// Convert a packed YUYV 4:2:2 buffer to RGB using BT.601 integer coefficients.
pub(crate) fn yuyv_to_rgb(width: u32, height: u32, yuyv: &[u8]) -> Result<DynamicImage> {
    let pixels = width as usize * height as usize;
    if yuyv.len() < pixels * 2 {
        return Err(Error::Image(format!(
            "YUYV frame has {} bytes, expected {}",
            yuyv.len(),
            pixels * 2
        )));
    }

    let mut rgb = Vec::with_capacity(pixels * 3);
    for chunk in yuyv[..pixels * 2].chunks_exact(4) {
        let u = chunk[1] as i32 - 128;
        let v = chunk[3] as i32 - 128;
        for luma in [chunk[0] as i32, chunk[2] as i32] {
            rgb.push((luma + ((v * 1436) >> 10)).clamp(0, 255) as u8);
            rgb.push((luma - ((u * 352 + v * 731) >> 10)).clamp(0, 255) as u8);
            rgb.push((luma + ((u * 1814) >> 10)).clamp(0, 255) as u8);
        }
    }

    ImageBuffer::from_raw(width, height, rgb)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| Error::Image("Failed to create RGB image from YUYV".to_string()))
}
