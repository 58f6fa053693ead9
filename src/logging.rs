//! Structured logging setup
//!
//! One global `tracing` registry carries up to two `fmt` layers behind a shared
//! `EnvFilter`: a plain-text log file (optionally rotated) and stdout. The stdout
//! layer is left out while the terminal UI owns the screen.

use crate::config::{LogRotation, LoggingOptions};
use crate::error::{Error, Result};
use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::OnceLock;
use tracing_appender::non_blocking::{NonBlocking, NonBlockingBuilder, WorkerGuard};
use tracing_appender::rolling;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

/// Flushes the file writer on process exit
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

type Sink = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Where log lines may be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Console {
    /// Tee to stdout alongside the optional log file.
    Stdout,
    /// The terminal belongs to the UI; only the log file (if any) receives output.
    Suppressed,
}

/// Install the global subscriber. A second call is a no-op.
///
/// `QSCAN_LOG_LEVEL` takes precedence over `options.level`.
pub fn init(options: &LoggingOptions, console: Console) -> Result<()> {
    if tracing::dispatcher::has_been_set() {
        return Ok(());
    }

    let filter = level_filter(options)?;

    let mut sinks: Vec<Sink> = Vec::with_capacity(2);
    if let Some(path) = options.file.as_deref() {
        let (writer, guard) = file_writer(path, options.rotation)?;
        let _ = FILE_GUARD.set(guard);
        sinks.push(
            fmt::layer()
                .with_timer(UtcTime::rfc_3339())
                .with_ansi(false)
                .with_writer(writer)
                .boxed(),
        );
    }
    if console == Console::Stdout {
        sinks.push(
            fmt::layer()
                .with_timer(UtcTime::rfc_3339())
                .with_ansi(options.color)
                .with_writer(io::stdout)
                .boxed(),
        );
    }

    Registry::default()
        .with(sinks.with_filter(filter))
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to install tracing subscriber: {e}")))
}

fn level_filter(options: &LoggingOptions) -> Result<EnvFilter> {
    let level = std::env::var("QSCAN_LOG_LEVEL").unwrap_or_else(|_| options.level.clone());
    EnvFilter::try_new(level.as_str())
        .map_err(|e| Error::Config(format!("Invalid log level '{level}': {e}")))
}

/// Non-blocking writer for `path`, creating its directory first. With a rotation the
/// file name becomes the prefix of the rolled files.
fn file_writer(path: &Path, rotation: Option<LogRotation>) -> Result<(NonBlocking, WorkerGuard)> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| {
        Error::Config(format!("Cannot create log directory {}: {e}", dir.display()))
    })?;

    let builder = NonBlockingBuilder::default().lossy(false);
    let Some(rotation) = rotation else {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| Error::Config(format!("Cannot open log file {}: {e}", path.display())))?;
        return Ok(builder.finish(file));
    };

    let prefix = path.file_name().ok_or_else(|| {
        Error::Config(format!(
            "Rotated log path '{}' needs a file name",
            path.display()
        ))
    })?;
    let appender = match rotation {
        LogRotation::Hourly => rolling::hourly(dir, prefix),
        LogRotation::Daily => rolling::daily(dir, prefix),
    };
    Ok(builder.finish(appender))
}
