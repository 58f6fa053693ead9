use super::{ScanPolicy, SessionEvent};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

/// Text shown before anything has been scanned in the current session
pub const DEFAULT_RESULT: &str = "No result";

/// Deadline used when the requested timeout does not fit in an `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Pending auto-stop for one session. Dropping the handle disarms it.
#[derive(Debug)]
pub struct TimeoutHandle {
    task: JoinHandle<()>,
    deadline: Instant,
}

impl TimeoutHandle {
    pub(crate) fn arm(
        after: Duration,
        generation: u64,
        tx: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        let now = Instant::now();
        let deadline = now.checked_add(after).unwrap_or_else(|| now + FAR_FUTURE);
        let task = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let _ = tx.send(SessionEvent::TimedOut { generation });
        });
        Self { task, deadline }
    }

    /// When the timeout fires
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the timeout fires
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

impl Drop for TimeoutHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// State of the current (or last) scan session.
///
/// `timeout` is only ever `Some` while the session is active.
#[derive(Debug)]
pub struct ScanSession {
    id: Option<Uuid>,
    generation: u64,
    active: bool,
    last_result: String,
    last_error: Option<String>,
    scans: usize,
    timeout: Option<TimeoutHandle>,
}

impl Default for ScanSession {
    fn default() -> Self {
        Self {
            id: None,
            generation: 0,
            active: false,
            last_result: DEFAULT_RESULT.to_string(),
            last_error: None,
            scans: 0,
            timeout: None,
        }
    }
}

impl ScanSession {
    /// Whether a session is running
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Most recent decoded text, or [`DEFAULT_RESULT`]
    pub fn last_result(&self) -> &str {
        &self.last_result
    }

    /// Error that ended the last session, if any
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Codes accepted since the session started
    pub fn scans(&self) -> usize {
        self.scans
    }

    /// Identifier of the current or last session
    pub fn id(&self) -> Option<Uuid> {
        self.id
    }

    /// Generation counter; incremented on every start
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether an auto-stop timeout is pending
    pub fn has_armed_timeout(&self) -> bool {
        self.timeout.is_some()
    }

    /// Time left before the auto-stop fires
    pub fn remaining(&self) -> Option<Duration> {
        self.timeout.as_ref().map(TimeoutHandle::remaining)
    }

    pub(crate) fn begin(&mut self, generation: u64) {
        self.id = Some(Uuid::new_v4());
        self.generation = generation;
        self.active = true;
        self.last_result = DEFAULT_RESULT.to_string();
        self.last_error = None;
        self.scans = 0;
        self.timeout = None;
    }

    pub(crate) fn arm(&mut self, timeout: TimeoutHandle) {
        debug_assert!(self.active, "timeout armed on an inactive session");
        self.timeout = Some(timeout);
    }

    pub(crate) fn record(&mut self, text: &str) {
        self.last_result = text.to_string();
        self.scans += 1;
    }

    pub(crate) fn fail(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    /// Mark the session inactive and disarm the timeout.
    /// Returns false if it was not active.
    pub(crate) fn end(&mut self) -> bool {
        self.timeout = None;
        std::mem::replace(&mut self.active, false)
    }

    /// Whether an event from `generation` may still act on this session
    pub(crate) fn accepts(&self, generation: u64) -> bool {
        self.active && self.generation == generation
    }
}

/// Snapshot of a session for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    /// Whether the scanner is running
    pub active: bool,
    /// Most recent decoded text
    pub last_result: String,
    /// Error to highlight, if any
    pub last_error: Option<String>,
    /// Codes accepted in the current session
    pub scans: usize,
    /// Policy in effect
    pub policy: ScanPolicy,
    /// Label of the frame source
    pub source: String,
    /// Seconds until the auto-stop, while active
    pub remaining_secs: Option<u64>,
}

impl SessionView {
    /// Label of the start/stop control
    pub fn button_label(&self) -> &'static str {
        if self.active {
            "Stop Scanner"
        } else {
            "Start Scanner"
        }
    }

    /// The "Scanned Data" line
    pub fn result_line(&self) -> String {
        format!("Scanned Data: {}", self.last_result)
    }
}
