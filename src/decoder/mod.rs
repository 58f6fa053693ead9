//! Decoder adapters
//!
//! An adapter owns a frame source while a scan session is active and reports every
//! recognized code back to the session controller through a [`DecodeSender`].
//! Two strategies exist:
//!
//! - [`StreamDecoder`] decodes every frame the source delivers.
//! - [`PollingDecoder`] grabs and decodes one frame per fixed interval.
//!
//! Both release the source when stopped; `stop` may be called any number of times.

mod polling;
mod stream;

pub use polling::PollingDecoder;
pub use stream::StreamDecoder;

use crate::error::{Error, Result};
use crate::qr::QrDecoder;
use crate::session::SessionEvent;
use crate::source::{FrameSource, FrameSourceProvider};
use async_trait::async_trait;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A code recognized by a decoder adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEvent {
    /// Decoded text
    pub text: String,
    /// When the adapter recognized it
    pub at: Instant,
}

/// Callback handle given to an adapter when a session starts.
///
/// Events are tagged with the session they belong to; once that session is over the
/// controller discards anything still arriving through an old sender.
#[derive(Debug, Clone)]
pub struct DecodeSender {
    generation: u64,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl DecodeSender {
    pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { generation, tx }
    }

    /// Report decoded text. Returns `false` once the controller is gone.
    pub fn decoded(&self, text: impl Into<String>) -> bool {
        let event = DecodedEvent {
            text: text.into(),
            at: Instant::now(),
        };
        self.tx
            .send(SessionEvent::Decoded {
                generation: self.generation,
                event,
            })
            .is_ok()
    }

    /// Report that the frame source failed and no further codes will follow.
    pub fn failed(&self, error: &Error) -> bool {
        self.tx
            .send(SessionEvent::DecoderFailed {
                generation: self.generation,
                message: error.to_string(),
            })
            .is_ok()
    }

    /// True once the receiving controller has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Session generation this sender reports for.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Capability interface wrapping camera access and code recognition.
#[async_trait]
pub trait DecoderAdapter: Send {
    /// Acquire the frame source and begin reporting codes through `sender`.
    ///
    /// Fails when the source cannot be acquired (no device, permission denied).
    async fn start(&mut self, sender: DecodeSender) -> Result<()>;

    /// Stop decoding and release the frame source. Safe to call repeatedly.
    fn stop(&mut self);

    /// Whether a decode loop is currently running.
    fn is_running(&self) -> bool;

    /// Label of the source this adapter decodes from.
    fn label(&self) -> String;
}

#[async_trait]
impl<D: DecoderAdapter + ?Sized> DecoderAdapter for Box<D> {
    async fn start(&mut self, sender: DecodeSender) -> Result<()> {
        (**self).start(sender).await
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn is_running(&self) -> bool {
        (**self).is_running()
    }

    fn label(&self) -> String {
        (**self).label()
    }
}

/// Which adapter drives a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecoderMode {
    /// Decode every frame as it arrives
    Stream,
    /// Decode one frame per poll interval
    Polling,
}

impl DecoderMode {
    /// Parse a mode name (case-insensitive)
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stream" | "continuous" => Some(Self::Stream),
            "polling" | "poll" => Some(Self::Polling),
            _ => None,
        }
    }

    /// Build the adapter for this mode on top of `provider`.
    pub fn build<P>(
        self,
        provider: P,
        poll_interval: Duration,
        idle_backoff: Duration,
    ) -> Box<dyn DecoderAdapter>
    where
        P: FrameSourceProvider + 'static,
    {
        match self {
            DecoderMode::Stream => {
                Box::new(StreamDecoder::new(provider).with_idle_backoff(idle_backoff))
            }
            DecoderMode::Polling => Box::new(PollingDecoder::new(provider, poll_interval)),
        }
    }
}

/// Background decode task plus the task it replaced.
///
/// A halted task is kept until the next start so the new session can wait for the
/// old one to drop its frame source before opening the device again.
#[derive(Debug, Default)]
struct Worker {
    task: Option<JoinHandle<()>>,
    retired: Option<JoinHandle<()>>,
}

impl Worker {
    fn spawn<F>(&mut self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.task = Some(tokio::spawn(future));
    }

    /// Abort the running task, if any. Returns whether one was running.
    fn halt(&mut self) -> bool {
        match self.task.take() {
            Some(handle) => {
                handle.abort();
                self.retired = Some(handle);
                true
            }
            None => false,
        }
    }

    /// Halt and wait until the previous task has released its resources.
    async fn settle(&mut self) {
        self.halt();
        if let Some(handle) = self.retired.take() {
            let _ = handle.await;
        }
    }

    fn is_running(&self) -> bool {
        self.task
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        for handle in self.task.iter().chain(self.retired.iter()) {
            handle.abort();
        }
    }
}

/// Outcome of pulling one frame from a source.
enum FrameOutcome {
    /// A code was read
    Code(String),
    /// Nothing readable in this frame
    Empty,
    /// The source is unusable; the loop must end
    SourceLost,
}

/// Pull one frame and try to read a code from it.
///
/// Decode noise and corrupt frames count as empty; only device failures end the loop,
/// after being reported through `sender`.
async fn read_frame(
    source: &mut dyn FrameSource,
    decoder: &QrDecoder,
    sender: &DecodeSender,
) -> FrameOutcome {
    let frame: DynamicImage = match source.next_frame().await {
        Ok(frame) => frame,
        Err(err) if err.is_device_failure() => {
            tracing::warn!("Frame source failed: {err}");
            sender.failed(&err);
            return FrameOutcome::SourceLost;
        }
        Err(err) => {
            tracing::debug!("Dropping unusable frame: {err}");
            return FrameOutcome::Empty;
        }
    };

    // Decoding is CPU bound; keep it off the runtime threads. Awaiting the result is
    // also the point where an aborted worker lets go of its source.
    let decoder = *decoder;
    let decoded = match tokio::task::spawn_blocking(move || decoder.decode(&frame)).await {
        Ok(decoded) => decoded,
        Err(err) => {
            tracing::warn!("Decode task failed: {err}");
            return FrameOutcome::Empty;
        }
    };

    match decoded {
        Ok(payload) => FrameOutcome::Code(payload.to_text_lossy()),
        Err(Error::NoQrCodeFound) => FrameOutcome::Empty,
        Err(err) => {
            tracing::debug!("Ignoring unreadable code: {err}");
            FrameOutcome::Empty
        }
    }
}
