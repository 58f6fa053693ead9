//! Scan notifications: an audible cue plus a transient toast

mod sound;
mod toast;

pub use sound::SoundCue;
pub use toast::{Toast, ToastPosition, ToastQueue};

use crate::config::NotifyOptions;
use crate::error::Result;

/// Receives every accepted code.
pub trait Notifier: Send {
    /// Signal that `text` was scanned. Must not block.
    fn notify(&self, text: &str);
}

impl<T: Notifier + ?Sized> Notifier for Box<T> {
    fn notify(&self, text: &str) {
        (**self).notify(text)
    }
}

/// Toast text for a scanned code
pub fn scanned_message(text: &str) -> String {
    format!("Product scanned: {text}")
}

/// Plays the scan cue and raises a toast.
#[derive(Debug)]
pub struct NotificationSink {
    sound: SoundCue,
    toasts: ToastQueue,
    position: ToastPosition,
}

impl NotificationSink {
    /// Combine a sound cue with a toast queue
    pub fn new(sound: SoundCue, toasts: ToastQueue, position: ToastPosition) -> Self {
        Self {
            sound,
            toasts,
            position,
        }
    }

    /// Build the sink described by the notification options
    pub fn from_options(options: &NotifyOptions) -> Result<Self> {
        let sound = SoundCue::from_options(options.sound, options.sound_file.as_deref())?;
        let toasts = ToastQueue::new(options.toast_ttl(), options.max_toasts);
        Ok(Self::new(sound, toasts, options.toast_position))
    }

    /// Handle to the toast queue for rendering
    pub fn toasts(&self) -> &ToastQueue {
        &self.toasts
    }

    /// Corner the toasts are shown in
    pub fn position(&self) -> ToastPosition {
        self.position
    }
}

impl Notifier for NotificationSink {
    fn notify(&self, text: &str) {
        self.sound.play();
        self.toasts.push(scanned_message(text));
    }
}
