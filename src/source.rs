//! Frame sources feeding the decoder adapters
//!
//! A [`FrameSourceProvider`] is the acquisition point: it is asked to `open` a fresh
//! [`FrameSource`] whenever a scan session starts, and the source is dropped when the
//! session stops. Besides the V4L2 camera there is [`ImageSequence`], which replays
//! still images in a loop and lets the scanner run without hardware.

use crate::error::{Error, Result};
use async_trait::async_trait;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// A live stream of frames.
#[async_trait]
pub trait FrameSource: Send {
    /// Wait for and return the next frame.
    async fn next_frame(&mut self) -> Result<DynamicImage>;

    /// Human-readable description used in logs and the preview panel.
    fn describe(&self) -> String;
}

/// Opens frame sources on demand.
#[async_trait]
pub trait FrameSourceProvider: Send + Sync {
    /// Acquire the underlying device and return a ready source.
    async fn open(&self) -> Result<Box<dyn FrameSource>>;

    /// Short label for the source that will be opened.
    fn label(&self) -> String;
}

#[async_trait]
impl<P: FrameSourceProvider + ?Sized> FrameSourceProvider for Box<P> {
    async fn open(&self) -> Result<Box<dyn FrameSource>> {
        (**self).open().await
    }

    fn label(&self) -> String {
        (**self).label()
    }
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "webp", "tif", "tiff"];

/// Where an [`ImageSequence`] gets its frames from.
#[derive(Debug, Clone)]
enum Frames {
    Directory(PathBuf),
    Memory(Arc<Vec<DynamicImage>>),
}

/// Replays a fixed set of images as if they came from a camera.
#[derive(Debug, Clone)]
pub struct ImageSequence {
    frames: Frames,
    frame_interval: Duration,
}

impl ImageSequence {
    /// Default spacing between replayed frames (~30 fps)
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(33);

    /// Replay every image in `dir`, in file-name order.
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            frames: Frames::Directory(dir.into()),
            frame_interval: Self::DEFAULT_INTERVAL,
        }
    }

    /// Replay frames already held in memory.
    pub fn from_images(images: Vec<DynamicImage>) -> Self {
        Self {
            frames: Frames::Memory(Arc::new(images)),
            frame_interval: Self::DEFAULT_INTERVAL,
        }
    }

    /// Change the delay between frames.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    async fn load_dir(dir: &Path) -> Result<Vec<DynamicImage>> {
        let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| {
            Error::Source(format!("Cannot read replay directory {}: {e}", dir.display()))
        })?;

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if is_image {
                paths.push(path);
            }
        }
        paths.sort();

        tokio::task::spawn_blocking(move || decode_files(paths))
            .await
            .map_err(|e| Error::Source(format!("Replay loader failed: {e}")))
    }
}

/// Decode image files in order, skipping the ones that cannot be read.
fn decode_files(paths: Vec<PathBuf>) -> Vec<DynamicImage> {
    let mut images = Vec::with_capacity(paths.len());
    for path in paths {
        match image::open(&path) {
            Ok(img) => images.push(img),
            Err(err) => tracing::warn!("Skipping unreadable frame {}: {err}", path.display()),
        }
    }
    images
}

#[async_trait]
impl FrameSourceProvider for ImageSequence {
    async fn open(&self) -> Result<Box<dyn FrameSource>> {
        let (frames, origin) = match &self.frames {
            Frames::Directory(dir) => (
                Arc::new(Self::load_dir(dir).await?),
                dir.display().to_string(),
            ),
            Frames::Memory(frames) => (Arc::clone(frames), "memory".to_string()),
        };

        if frames.is_empty() {
            return Err(Error::Source(format!("no images to replay from {origin}")));
        }

        tracing::debug!(frames = frames.len(), %origin, "Replay source opened");
        Ok(Box::new(Replay {
            frames,
            origin,
            position: 0,
            interval: self.frame_interval,
            started: false,
        }))
    }

    fn label(&self) -> String {
        match &self.frames {
            Frames::Directory(dir) => format!("replay {}", dir.display()),
            Frames::Memory(frames) => format!("replay of {} frame(s)", frames.len()),
        }
    }
}

struct Replay {
    frames: Arc<Vec<DynamicImage>>,
    origin: String,
    position: usize,
    interval: Duration,
    started: bool,
}

#[async_trait]
impl FrameSource for Replay {
    async fn next_frame(&mut self) -> Result<DynamicImage> {
        if self.started {
            tokio::time::sleep(self.interval).await;
        }
        self.started = true;

        let frame = self.frames[self.position].clone();
        self.position = (self.position + 1) % self.frames.len();
        Ok(frame)
    }

    fn describe(&self) -> String {
        format!("replay {} ({} frames)", self.origin, self.frames.len())
    }
}
