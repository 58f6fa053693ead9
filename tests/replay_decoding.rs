//! End-to-end sessions over replayed frames with real QR decoding

use image::{DynamicImage, GrayImage, Luma};
use qscan::decoder::{PollingDecoder, StreamDecoder};
use qscan::notify::{NotificationSink, SoundCue, ToastPosition, ToastQueue};
use qscan::{
    DecoderAdapter, DecoderMode, ImageSequence, ScanPolicy, SessionController, SessionSettings,
};
use std::time::Duration;

fn qr_frame(text: &str) -> DynamicImage {
    let code = qrcode::QrCode::new(text.as_bytes()).expect("encode");
    DynamicImage::ImageLuma8(code.render::<Luma<u8>>().min_dimensions(200, 200).build())
}

fn blank_frame() -> DynamicImage {
    DynamicImage::ImageLuma8(GrayImage::from_pixel(200, 200, Luma([255u8])))
}

fn sink() -> (NotificationSink, ToastQueue) {
    let toasts = ToastQueue::new(Duration::from_secs(30), 3);
    let sink = NotificationSink::new(SoundCue::Silent, toasts.clone(), ToastPosition::TopRight);
    (sink, toasts)
}

fn toast_messages(toasts: &ToastQueue) -> Vec<String> {
    toasts.visible().into_iter().map(|toast| toast.message).collect()
}

async fn run_session<D: DecoderAdapter>(controller: &mut SessionController<D, NotificationSink>) {
    assert!(controller.start().await);
    tokio::time::timeout(Duration::from_secs(20), controller.run_until_stopped())
        .await
        .expect("session should end on the first code");
}

#[tokio::test]
async fn stream_decoder_stops_on_first_code() {
    let provider = ImageSequence::from_images(vec![blank_frame(), qr_frame("ABC123")])
        .with_interval(Duration::from_millis(1));
    let decoder = StreamDecoder::new(provider).with_idle_backoff(Duration::ZERO);
    let (sink, toasts) = sink();
    let mut controller = SessionController::new(decoder, sink, SessionSettings::default());

    run_session(&mut controller).await;

    assert_eq!(controller.session().last_result(), "ABC123");
    assert_eq!(controller.session().last_error(), None);
    assert!(!controller.decoder().is_running());
    assert_eq!(toast_messages(&toasts), vec!["Product scanned: ABC123"]);
}

#[tokio::test]
async fn polling_decoder_stops_on_first_code() {
    let provider = ImageSequence::from_images(vec![qr_frame("POLL-42")])
        .with_interval(Duration::from_millis(1));
    let decoder = PollingDecoder::new(provider, Duration::from_millis(10));
    let (sink, toasts) = sink();
    let mut controller = SessionController::new(decoder, sink, SessionSettings::default());

    run_session(&mut controller).await;

    assert_eq!(controller.session().last_result(), "POLL-42");
    assert!(!controller.decoder().is_running());
    assert_eq!(toast_messages(&toasts), vec!["Product scanned: POLL-42"]);
}

#[tokio::test]
async fn replay_directory_feeds_continuous_session() {
    let dir = tempfile::tempdir().expect("tempdir");
    blank_frame()
        .save(dir.path().join("000-blank.png"))
        .expect("write blank frame");
    qr_frame("SKU-7")
        .save(dir.path().join("001-code.png"))
        .expect("write code frame");

    let decoder = DecoderMode::Stream.build(
        ImageSequence::from_dir(dir.path()).with_interval(Duration::from_millis(1)),
        Duration::from_millis(10),
        Duration::ZERO,
    );
    let (sink, toasts) = sink();
    let settings = SessionSettings {
        policy: ScanPolicy::ContinueUntilTimeout,
        timeout: Duration::from_secs(60),
    };
    let mut controller = SessionController::new(decoder, sink, settings);

    assert!(controller.start().await);
    while controller.session().scans() < 2 {
        tokio::time::timeout(Duration::from_secs(20), controller.process_next())
            .await
            .expect("code frames keep arriving");
    }

    assert!(controller.is_active());
    assert_eq!(controller.session().last_result(), "SKU-7");
    assert!(toast_messages(&toasts).len() >= 2);

    controller.stop(qscan::StopReason::User);
    assert!(!controller.decoder().is_running());
}

#[tokio::test]
async fn empty_replay_directory_fails_to_start() {
    let dir = tempfile::tempdir().expect("tempdir");
    let decoder = StreamDecoder::new(ImageSequence::from_dir(dir.path()));
    let (sink, toasts) = sink();
    let mut controller = SessionController::new(decoder, sink, SessionSettings::default());

    assert!(!controller.start().await);
    assert!(!controller.is_active());
    assert!(!controller.session().has_armed_timeout());
    assert!(
        controller
            .session()
            .last_error()
            .is_some_and(|message| message.contains("no images to replay"))
    );
    assert!(toast_messages(&toasts).is_empty());
}
