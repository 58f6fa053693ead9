//! QSCAN terminal scanner entrypoint

use clap::Parser;
use qscan::logging::{self, Console};
use qscan::notify::{NotificationSink, ToastQueue};
use qscan::output::{render_session, toast_line, toast_value};
use qscan::source::{FrameSourceProvider, ImageSequence};
use qscan::{
    DecoderAdapter, DecoderMode, Error, QscanConfig, Result, ScanPolicy, SessionController,
    StopReason, ui,
};
use serde_json::Value;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "qscan",
    version,
    about = "Webcam barcode/QR scanner with timed scan sessions"
)]
struct Cli {
    /// Optional configuration file (toml/yaml). Defaults to qscan.{toml,yaml} in cwd/XDG config.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override camera by name (takes precedence over config file)
    #[arg(long, value_name = "NAME")]
    device: Option<String>,

    /// Override camera by index (/dev/videoN)
    #[arg(long, value_name = "INDEX")]
    device_index: Option<usize>,

    /// Replay the images in a directory instead of using a live camera
    #[arg(long, value_name = "DIR")]
    replay: Option<PathBuf>,

    /// Decoder adapter (`stream` or `polling`)
    #[arg(long, value_name = "MODE")]
    decoder: Option<String>,

    /// Interval between decode attempts for the polling decoder
    #[arg(long, value_name = "MS")]
    poll_interval_ms: Option<u64>,

    /// What to do after a successful scan (`stop-on-match` or `continue`)
    #[arg(long, value_name = "POLICY")]
    policy: Option<String>,

    /// Seconds before a scan session stops on its own
    #[arg(long, value_name = "SECS")]
    timeout_secs: Option<u64>,

    /// Disable the audible scan cue
    #[arg(long)]
    silent: bool,

    /// Run one session without the terminal UI and print updates as they happen
    #[arg(long)]
    headless: bool,

    /// Output headless updates as JSON instead of human-readable text
    #[arg(long)]
    json: bool,

    /// List detected cameras and exit
    #[arg(long)]
    list_cameras: bool,
}

type Controller = SessionController<Box<dyn DecoderAdapter>, NotificationSink>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.list_cameras {
        return list_cameras();
    }

    let mut config = QscanConfig::load(cli.config.as_deref())?;
    apply_overrides(&mut config, &cli)?;

    let headless = cli.headless || cli.json;
    let console = if headless {
        Console::Stdout
    } else {
        Console::Suppressed
    };
    logging::init(&config.logging, console)?;

    let settings = config.session.settings()?;
    let provider = build_provider(&config, cli.replay.clone())?;
    let decoder = config.session.decoder.build(
        provider,
        config.session.poll_interval(),
        config.session.idle_backoff(),
    );
    let sink = NotificationSink::from_options(&config.notify)?;
    let toasts = sink.toasts().clone();
    let position = sink.position();

    info!(
        source = %decoder.label(),
        decoder = ?config.session.decoder,
        policy = settings.policy.label(),
        timeout_secs = settings.timeout.as_secs(),
        "Starting QSCAN"
    );

    let mut controller = SessionController::new(decoder, sink, settings);

    if headless {
        run_headless(&mut controller, &toasts, cli.json).await
    } else {
        ui::run(&mut controller, &toasts, position).await
    }
}

fn apply_overrides(config: &mut QscanConfig, cli: &Cli) -> Result<()> {
    if let Some(ref name) = cli.device {
        config.camera.device_name = Some(name.clone());
        config.camera.device_index = None;
    }

    if let Some(index) = cli.device_index {
        config.camera.device_index = Some(index);
        config.camera.device_name = None;
    }

    if let Some(ref mode) = cli.decoder {
        config.session.decoder = DecoderMode::parse(mode).ok_or_else(|| {
            Error::Config(format!("Unknown decoder '{mode}'. Use stream or polling"))
        })?;
    }

    if let Some(interval) = cli.poll_interval_ms {
        config.session.poll_interval_ms = interval;
    }

    if let Some(ref policy) = cli.policy {
        config.session.policy = ScanPolicy::parse(policy).ok_or_else(|| {
            Error::Config(format!(
                "Unknown policy '{policy}'. Use stop-on-match or continue"
            ))
        })?;
    }

    if let Some(secs) = cli.timeout_secs {
        config.session.timeout_secs = secs;
    }

    if cli.silent {
        config.notify.sound = false;
    }

    Ok(())
}

fn build_provider(
    config: &QscanConfig,
    replay: Option<PathBuf>,
) -> Result<Box<dyn FrameSourceProvider>> {
    if let Some(dir) = replay {
        return Ok(Box::new(ImageSequence::from_dir(dir)));
    }

    #[cfg(feature = "camera")]
    {
        let camera_config = config.camera_config()?;
        info!(?camera_config, "Using V4L2 camera");
        Ok(Box::new(qscan::CameraProvider::new(camera_config)))
    }

    #[cfg(not(feature = "camera"))]
    {
        let _ = config;
        Err(Error::Config(
            "Built without the `camera` feature; pass --replay <DIR>".to_string(),
        ))
    }
}

#[cfg(feature = "camera")]
fn list_cameras() -> Result<()> {
    let devices = qscan::camera::list_devices()?;
    if devices.is_empty() {
        println!("No V4L2 cameras detected");
    } else {
        println!("Discovered cameras:");
        for dev in devices {
            println!("  [{}] {} ({})", dev.index, dev.name, dev.path);
        }
    }
    Ok(())
}

#[cfg(not(feature = "camera"))]
fn list_cameras() -> Result<()> {
    Err(Error::Config(
        "Built without the `camera` feature; no cameras to list".to_string(),
    ))
}

/// Run a single session without the UI, printing every state change.
///
/// Ctrl-C stops the session the same way the stop button does.
async fn run_headless(controller: &mut Controller, toasts: &ToastQueue, json: bool) -> Result<()> {
    let mut last_toast = 0;

    controller.start().await;
    emit_session(controller, json)?;

    while controller.is_active() {
        let changed = tokio::select! {
            changed = controller.process_next() => changed,
            signal = tokio::signal::ctrl_c() => {
                signal?;
                controller.stop(StopReason::User)
            }
        };

        for toast in toasts.since(last_toast) {
            last_toast = toast.id;
            if json {
                emit_json(&toast_value(&toast))?;
            } else {
                println!("{}", toast_line(&toast));
            }
        }

        if changed {
            emit_session(controller, json)?;
        }
    }

    Ok(())
}

fn emit_session(controller: &Controller, json: bool) -> Result<()> {
    let rendered = render_session(&controller.view());
    if json {
        emit_json(&rendered.json)
    } else {
        for line in &rendered.human {
            println!("{line}");
        }
        Ok(())
    }
}

fn emit_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}
