use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Screen corner toasts are stacked in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToastPosition {
    /// Upper left corner
    TopLeft,
    /// Upper right corner
    TopRight,
    /// Lower left corner
    BottomLeft,
    /// Lower right corner
    BottomRight,
}

impl ToastPosition {
    /// Parse a corner name such as `top-right` (case-insensitive)
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "top-left" => Some(Self::TopLeft),
            "top-right" => Some(Self::TopRight),
            "bottom-left" => Some(Self::BottomLeft),
            "bottom-right" => Some(Self::BottomRight),
            _ => None,
        }
    }

    /// Whether toasts stack downwards from the top edge
    pub fn is_top(self) -> bool {
        matches!(self, Self::TopLeft | Self::TopRight)
    }

    /// Whether toasts hug the left edge
    pub fn is_left(self) -> bool {
        matches!(self, Self::TopLeft | Self::BottomLeft)
    }
}

/// A transient message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    /// Monotonic id, unique per queue
    pub id: u64,
    /// Text shown to the user
    pub message: String,
    /// When the toast was raised
    pub created_at: Instant,
    /// How long it stays visible
    pub ttl: Duration,
}

impl Toast {
    /// Whether the toast is still visible at `now`
    pub fn is_visible(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) < self.ttl
    }
}

#[derive(Debug, Default)]
struct ToastState {
    next_id: u64,
    toasts: VecDeque<Toast>,
}

/// Shared, auto-expiring list of toasts.
///
/// Cloning yields another handle to the same queue: the notification sink pushes,
/// the presentation layer reads.
#[derive(Debug, Clone)]
pub struct ToastQueue {
    state: Arc<Mutex<ToastState>>,
    ttl: Duration,
    max_visible: usize,
}

impl ToastQueue {
    /// Create a queue whose toasts live for `ttl`, showing at most `max_visible`
    pub fn new(ttl: Duration, max_visible: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(ToastState::default())),
            ttl,
            max_visible: max_visible.max(1),
        }
    }

    /// Raise a toast and return its id
    pub fn push(&self, message: impl Into<String>) -> u64 {
        self.push_at(message, Instant::now())
    }

    pub(crate) fn push_at(&self, message: impl Into<String>, now: Instant) -> u64 {
        let mut state = self.state.lock().expect("toast mutex poisoned");
        state.next_id += 1;
        let id = state.next_id;
        state.toasts.push_back(Toast {
            id,
            message: message.into(),
            created_at: now,
            ttl: self.ttl,
        });
        while state.toasts.len() > self.max_visible {
            state.toasts.pop_front();
        }
        id
    }

    /// Toasts still visible at `now`, oldest first. Expired toasts are dropped.
    pub fn visible_at(&self, now: Instant) -> Vec<Toast> {
        let mut state = self.state.lock().expect("toast mutex poisoned");
        state.toasts.retain(|toast| toast.is_visible(now));
        state.toasts.iter().cloned().collect()
    }

    /// Toasts visible right now
    pub fn visible(&self) -> Vec<Toast> {
        self.visible_at(Instant::now())
    }

    /// Visible toasts raised after the toast with id `after`
    pub fn since(&self, after: u64) -> Vec<Toast> {
        self.visible()
            .into_iter()
            .filter(|toast| toast.id > after)
            .collect()
    }
}
