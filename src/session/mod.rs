//! Scan session state machine
//!
//! A session is one user-initiated scan attempt. [`SessionController`] starts the
//! decoder adapter, arms the auto-stop timeout and reacts to decoded codes according
//! to the configured [`ScanPolicy`]. Decoder callbacks and the timeout reach the
//! controller as [`SessionEvent`]s tagged with the session generation, so an event
//! from a session that already ended can never act on the next one.

mod controller;
mod state;

pub use controller::SessionController;
pub use state::{DEFAULT_RESULT, ScanSession, SessionView, TimeoutHandle};

use crate::decoder::DecodedEvent;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// What happens after a code has been decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanPolicy {
    /// End the session as soon as one code is read
    #[serde(alias = "stop-on-match")]
    StopOnFirstMatch,
    /// Keep reading codes until the timeout ends the session
    #[serde(alias = "continue")]
    ContinueUntilTimeout,
}

impl ScanPolicy {
    /// Parse a policy name (case-insensitive)
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stop-on-first-match" | "stop-on-match" | "stop" => Some(Self::StopOnFirstMatch),
            "continue-until-timeout" | "continue" => Some(Self::ContinueUntilTimeout),
            _ => None,
        }
    }

    /// Short label for status lines
    pub fn label(self) -> &'static str {
        match self {
            ScanPolicy::StopOnFirstMatch => "stop on first match",
            ScanPolicy::ContinueUntilTimeout => "continue until timeout",
        }
    }
}

impl Default for ScanPolicy {
    fn default() -> Self {
        ScanPolicy::StopOnFirstMatch
    }
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopReason {
    /// A code was read under [`ScanPolicy::StopOnFirstMatch`]
    Success,
    /// The session ran out of time
    Timeout,
    /// The user stopped it
    User,
    /// The decoder could not be started or lost its source
    Failure,
    /// The controller was dropped while scanning
    Unmount,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StopReason::Success => "success",
            StopReason::Timeout => "timeout",
            StopReason::User => "user",
            StopReason::Failure => "failure",
            StopReason::Unmount => "unmount",
        };
        f.write_str(label)
    }
}

/// Controller parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Reaction to decoded codes
    pub policy: ScanPolicy,
    /// Maximum session length
    pub timeout: Duration,
}

impl SessionSettings {
    /// Sessions end after one minute unless configured otherwise
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            policy: ScanPolicy::default(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }
}

/// Messages delivered to the controller by decoders and the timeout task.
#[derive(Debug)]
pub(crate) enum SessionEvent {
    Decoded { generation: u64, event: DecodedEvent },
    DecoderFailed { generation: u64, message: String },
    TimedOut { generation: u64 },
}

impl SessionEvent {
    fn generation(&self) -> u64 {
        match self {
            SessionEvent::Decoded { generation, .. }
            | SessionEvent::DecoderFailed { generation, .. }
            | SessionEvent::TimedOut { generation } => *generation,
        }
    }
}

/// Error text shown when a session times out.
///
/// Distinguishes a session that never saw a code from one that ran its full course
/// while collecting codes.
pub fn timeout_message(timeout: Duration, scans: usize) -> String {
    let span = describe_duration(timeout);
    if scans == 0 {
        format!("No barcode found after {span}.")
    } else {
        format!("Scanning stopped after {span}.")
    }
}

/// Human wording for a timeout length ("1 minute", "90 seconds").
pub fn describe_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let plural = |n: u64, unit: &str| {
        if n == 1 {
            format!("1 {unit}")
        } else {
            format!("{n} {unit}s")
        }
    };

    if secs >= 60 && secs % 60 == 0 {
        plural(secs / 60, "minute")
    } else if secs > 0 {
        plural(secs, "second")
    } else {
        plural(duration.as_millis() as u64, "millisecond")
    }
}
