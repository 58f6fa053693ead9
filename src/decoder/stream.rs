//! Continuous decoding bound to a live frame source

use super::{DecodeSender, DecoderAdapter, FrameOutcome, Worker, read_frame};
use crate::error::Result;
use crate::qr::QrDecoder;
use crate::source::{FrameSource, FrameSourceProvider};
use async_trait::async_trait;
use std::time::Duration;

/// Decodes every frame the source produces.
pub struct StreamDecoder<P> {
    provider: P,
    idle_backoff: Duration,
    worker: Worker,
}

impl<P: FrameSourceProvider> StreamDecoder<P> {
    /// Default pause after a frame without a code
    pub const DEFAULT_IDLE_BACKOFF: Duration = Duration::from_millis(90);

    /// Create a stream decoder over `provider`
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            idle_backoff: Self::DEFAULT_IDLE_BACKOFF,
            worker: Worker::default(),
        }
    }

    /// Pause this long after a frame without a code before grabbing the next one
    pub fn with_idle_backoff(mut self, backoff: Duration) -> Self {
        self.idle_backoff = backoff;
        self
    }
}

#[async_trait]
impl<P: FrameSourceProvider> DecoderAdapter for StreamDecoder<P> {
    async fn start(&mut self, sender: DecodeSender) -> Result<()> {
        self.worker.settle().await;

        let source = self.provider.open().await?;
        tracing::info!(source = %source.describe(), "Stream decoder started");

        self.worker
            .spawn(decode_stream(source, sender, self.idle_backoff));
        Ok(())
    }

    fn stop(&mut self) {
        if self.worker.halt() {
            tracing::debug!("Stream decoder stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    fn label(&self) -> String {
        self.provider.label()
    }
}

async fn decode_stream(mut source: Box<dyn FrameSource>, sender: DecodeSender, backoff: Duration) {
    let decoder = QrDecoder::new();

    loop {
        match read_frame(source.as_mut(), &decoder, &sender).await {
            FrameOutcome::Code(text) => {
                if !sender.decoded(text) {
                    break;
                }
                // Sources may hand out frames without ever suspending; give a pending
                // abort the chance to land while a code stays in view
                tokio::task::yield_now().await;
            }
            FrameOutcome::Empty => {
                if sender.is_closed() {
                    break;
                }
                tokio::time::sleep(backoff).await;
            }
            FrameOutcome::SourceLost => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionEvent;
    use crate::source::ImageSequence;
    use image::{DynamicImage, GrayImage, Luma};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    fn qr_frame(text: &str) -> DynamicImage {
        let code = qrcode::QrCode::new(text.as_bytes()).expect("encode");
        DynamicImage::ImageLuma8(code.render::<Luma<u8>>().min_dimensions(160, 160).build())
    }

    fn blank_frame() -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(160, 160, Luma([255u8])))
    }

    #[tokio::test]
    async fn test_reports_codes_repeatedly() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let provider = ImageSequence::from_images(vec![blank_frame(), qr_frame("STREAM-1")])
            .with_interval(Duration::from_millis(1));
        let mut decoder = StreamDecoder::new(provider).with_idle_backoff(Duration::ZERO);

        decoder
            .start(DecodeSender::new(1, tx))
            .await
            .expect("start");
        assert!(decoder.is_running());

        for _ in 0..2 {
            match rx.recv().await.expect("event") {
                SessionEvent::Decoded { generation, event } => {
                    assert_eq!(generation, 1);
                    assert_eq!(event.text, "STREAM-1");
                }
                other => panic!("unexpected event {other:?}"),
            }
        }

        decoder.stop();
        decoder.stop();
        assert!(!decoder.is_running());
    }

    /// Hands out the same frame on every call without ever suspending, like a
    /// blocking V4L2 capture.
    struct BusySource {
        frame: DynamicImage,
        released: Arc<AtomicBool>,
    }

    #[async_trait]
    impl FrameSource for BusySource {
        async fn next_frame(&mut self) -> Result<DynamicImage> {
            std::thread::sleep(Duration::from_millis(2));
            Ok(self.frame.clone())
        }

        fn describe(&self) -> String {
            "busy".to_string()
        }
    }

    impl Drop for BusySource {
        fn drop(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    struct BusyProvider {
        opened: Arc<AtomicUsize>,
        released: Arc<AtomicBool>,
    }

    #[async_trait]
    impl FrameSourceProvider for BusyProvider {
        async fn open(&self) -> Result<Box<dyn FrameSource>> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            self.released.store(false, Ordering::SeqCst);
            Ok(Box::new(BusySource {
                frame: qr_frame("ABC123"),
                released: Arc::clone(&self.released),
            }))
        }

        fn label(&self) -> String {
            "busy".to_string()
        }
    }

    async fn wait_for(flag: &AtomicBool) -> bool {
        for _ in 0..500 {
            if flag.load(Ordering::SeqCst) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_releases_source_with_code_in_view() {
        let opened = Arc::new(AtomicUsize::new(0));
        let released = Arc::new(AtomicBool::new(false));
        let provider = BusyProvider {
            opened: Arc::clone(&opened),
            released: Arc::clone(&released),
        };
        let mut decoder = StreamDecoder::new(provider);

        let (tx, mut rx) = mpsc::unbounded_channel();
        decoder
            .start(DecodeSender::new(1, tx))
            .await
            .expect("start");
        assert!(matches!(
            rx.recv().await.expect("event"),
            SessionEvent::Decoded { .. }
        ));

        decoder.stop();
        assert!(wait_for(&released).await, "source still held after stop");

        // Restarting must not wait on the previous worker forever
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::time::timeout(Duration::from_secs(5), decoder.start(DecodeSender::new(2, tx)))
            .await
            .expect("restart settled")
            .expect("restart");
        assert_eq!(opened.load(Ordering::SeqCst), 2);
        assert!(matches!(
            rx.recv().await.expect("event"),
            SessionEvent::Decoded { generation: 2, .. }
        ));

        decoder.stop();
        assert!(wait_for(&released).await);
    }

    #[tokio::test]
    async fn test_open_failure_propagates() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut decoder = StreamDecoder::new(ImageSequence::from_images(Vec::new()));

        assert!(decoder.start(DecodeSender::new(1, tx)).await.is_err());
        assert!(!decoder.is_running());
        decoder.stop();
    }
}
