//! Run one scan session over a directory of images
//!
//! Usage: cargo run --example replay_scan -- <DIR> [continue]

use qscan::decoder::StreamDecoder;
use qscan::notify::{NotificationSink, SoundCue, ToastPosition, ToastQueue};
use qscan::{ImageSequence, ScanPolicy, SessionController, SessionSettings};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with INFO level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let dir = args
        .next()
        .ok_or_else(|| anyhow::anyhow!("usage: replay_scan <DIR> [continue]"))?;
    let policy = args
        .next()
        .and_then(|value| ScanPolicy::parse(&value))
        .unwrap_or_default();

    println!("QSCAN Replay Scanner");
    println!("====================\n");

    let toasts = ToastQueue::new(Duration::from_secs(2), 3);
    let sink = NotificationSink::new(SoundCue::Bell, toasts.clone(), ToastPosition::TopRight);
    let decoder = StreamDecoder::new(ImageSequence::from_dir(&dir));
    let settings = SessionSettings {
        policy,
        timeout: Duration::from_secs(10),
    };
    let mut controller = SessionController::new(decoder, sink, settings);

    if !controller.start().await {
        anyhow::bail!(
            "scanner failed to start: {}",
            controller.session().last_error().unwrap_or("unknown error")
        );
    }
    println!("Scanning {dir} ({})...\n", policy.label());

    let mut last_toast = 0;
    while controller.is_active() {
        controller.process_next().await;
        for toast in toasts.since(last_toast) {
            last_toast = toast.id;
            println!("✓ {}", toast.message);
        }
    }

    let view = controller.view();
    println!("\n{}", view.result_line());
    if let Some(error) = view.last_error {
        println!("{error}");
    }
    Ok(())
}
