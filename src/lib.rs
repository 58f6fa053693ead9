//! QSCAN - camera barcode and QR scan sessions for Linux terminals
//!
//! This library drives time-boxed scan sessions: a user starts the scanner, a
//! decoder adapter reads frames from a V4L2 camera (or a replayed image sequence),
//! and every recognized code is reported, announced with a sound and a toast, and
//! either ends the session or is collected until the session times out.
//!
//! # Features
//!
//! - **Camera Integration**: Direct V4L2 access through the `camera` feature
//! - **Decoder Adapters**: Stream every frame or poll at a fixed interval
//! - **Session Control**: One-minute auto-stop, stale-event guard, guaranteed release
//! - **Terminal UI**: ratatui front end with corner toasts; headless JSON output
//!
//! # Example
//!
//! ```no_run
//! use qscan::decoder::StreamDecoder;
//! use qscan::notify::{NotificationSink, SoundCue, ToastPosition, ToastQueue};
//! use qscan::session::{SessionController, SessionSettings};
//! use qscan::source::ImageSequence;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let decoder = StreamDecoder::new(ImageSequence::from_dir("frames"));
//!     let toasts = ToastQueue::new(Duration::from_secs(2), 3);
//!     let sink = NotificationSink::new(SoundCue::Silent, toasts, ToastPosition::TopRight);
//!
//!     let mut controller = SessionController::new(decoder, sink, SessionSettings::default());
//!     controller.start().await;
//!     controller.run_until_stopped().await;
//!
//!     println!("{}", controller.view().result_line());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs, rust_2024_compatibility)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub mod decoder;
pub mod error;
pub mod logging;
pub mod notify;
pub mod output;
pub mod qr;
pub mod session;
pub mod source;
pub mod ui;

#[cfg(feature = "camera")]
#[cfg_attr(docsrs, doc(cfg(feature = "camera")))]
pub mod camera;

// Re-exports for convenience
pub use error::{Error, Result};

#[cfg(feature = "camera")]
pub use camera::{Camera, CameraConfig, CameraDevice, CameraProvider};

pub use config::{
    CameraOptions, LogRotation, LoggingOptions, NotifyOptions, QscanConfig, SessionOptions,
};
pub use decoder::{DecodeSender, DecodedEvent, DecoderAdapter, DecoderMode};
pub use notify::{NotificationSink, Notifier};
pub use qr::{QrDecoder, QrPayload};
pub use session::{ScanPolicy, SessionController, SessionSettings, SessionView, StopReason};
pub use source::{FrameSource, FrameSourceProvider, ImageSequence};
