//! Interval-based decoding

use super::{DecodeSender, DecoderAdapter, FrameOutcome, Worker, read_frame};
use crate::error::Result;
use crate::qr::QrDecoder;
use crate::source::{FrameSource, FrameSourceProvider};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};

/// Grabs one frame every `interval` and reports any code it holds.
pub struct PollingDecoder<P> {
    provider: P,
    interval: Duration,
    worker: Worker,
}

impl<P: FrameSourceProvider> PollingDecoder<P> {
    /// Create a polling decoder; the interval is clamped to at least 10ms.
    pub fn new(provider: P, interval: Duration) -> Self {
        Self {
            provider,
            interval: interval.max(Duration::from_millis(10)),
            worker: Worker::default(),
        }
    }

    /// The effective poll interval
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[async_trait]
impl<P: FrameSourceProvider> DecoderAdapter for PollingDecoder<P> {
    async fn start(&mut self, sender: DecodeSender) -> Result<()> {
        self.worker.settle().await;

        let source = self.provider.open().await?;
        tracing::info!(
            source = %source.describe(),
            interval_ms = self.interval.as_millis() as u64,
            "Polling decoder started"
        );

        self.worker.spawn(poll_source(source, sender, self.interval));
        Ok(())
    }

    fn stop(&mut self) {
        if self.worker.halt() {
            tracing::debug!("Polling decoder stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    fn label(&self) -> String {
        self.provider.label()
    }
}

async fn poll_source(mut source: Box<dyn FrameSource>, sender: DecodeSender, interval: Duration) {
    let decoder = QrDecoder::new();
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if sender.is_closed() {
            break;
        }

        match read_frame(source.as_mut(), &decoder, &sender).await {
            FrameOutcome::Code(text) => {
                if !sender.decoded(text) {
                    break;
                }
            }
            FrameOutcome::Empty => {}
            FrameOutcome::SourceLost => break,
        }
    }
}
