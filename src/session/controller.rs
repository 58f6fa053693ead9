use super::state::{ScanSession, SessionView, TimeoutHandle};
use super::{ScanPolicy, SessionEvent, SessionSettings, StopReason, timeout_message};
use crate::decoder::{DecodeSender, DecoderAdapter};
use crate::notify::Notifier;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Coordinates one decoder adapter, one notifier and the session timeout.
///
/// The controller is the only owner of the session state. Decoder callbacks and the
/// timeout arrive as events on an internal channel and take effect when the owner
/// drives [`process_next`](Self::process_next), [`poll_pending`](Self::poll_pending)
/// or [`run_until_stopped`](Self::run_until_stopped).
pub struct SessionController<D: DecoderAdapter, N: Notifier> {
    decoder: D,
    notifier: N,
    settings: SessionSettings,
    session: ScanSession,
    next_generation: u64,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl<D: DecoderAdapter, N: Notifier> SessionController<D, N> {
    /// Create an idle controller
    pub fn new(decoder: D, notifier: N, settings: SessionSettings) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            decoder,
            notifier,
            settings,
            session: ScanSession::default(),
            next_generation: 1,
            events_tx,
            events_rx,
        }
    }

    /// Current session state
    pub fn session(&self) -> &ScanSession {
        &self.session
    }

    /// Controller settings
    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    /// Whether a session is running
    pub fn is_active(&self) -> bool {
        self.session.is_active()
    }

    /// The decoder adapter
    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    /// The notification sink
    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Snapshot for rendering
    pub fn view(&self) -> SessionView {
        SessionView {
            active: self.session.is_active(),
            last_result: self.session.last_result().to_string(),
            last_error: self.session.last_error().map(str::to_string),
            scans: self.session.scans(),
            policy: self.settings.policy,
            source: self.decoder.label(),
            remaining_secs: self
                .session
                .remaining()
                .map(|left| left.as_secs_f64().ceil() as u64),
        }
    }

    /// Start a session.
    ///
    /// Clears the previous result and error, acquires the decoder and arms the
    /// timeout. When the decoder cannot be started the failure is recorded as the
    /// session error and the session is stopped again; no timeout is armed then.
    /// Returns whether the session is running afterwards. Starting while already
    /// active changes nothing.
    pub async fn start(&mut self) -> bool {
        if self.session.is_active() {
            debug!("start ignored, session already active");
            return true;
        }

        let generation = self.next_generation;
        self.next_generation += 1;
        self.session.begin(generation);

        let sender = DecodeSender::new(generation, self.events_tx.clone());
        if let Err(err) = self.decoder.start(sender).await {
            warn!(
                session = ?self.session.id(),
                source = %self.decoder.label(),
                "Scanner failed to start: {err}"
            );
            self.session.fail(err.to_string());
            self.stop(StopReason::Failure);
            return false;
        }

        self.session.arm(TimeoutHandle::arm(
            self.settings.timeout,
            generation,
            self.events_tx.clone(),
        ));

        info!(
            session = ?self.session.id(),
            source = %self.decoder.label(),
            policy = self.settings.policy.label(),
            timeout_secs = self.settings.timeout.as_secs(),
            "Scan session started"
        );
        true
    }

    /// Stop the session: disarm the timeout and release the decoder.
    ///
    /// Keeps the last result and error for display. Returns false (and does nothing)
    /// when no session is active.
    pub fn stop(&mut self, reason: StopReason) -> bool {
        if !self.session.end() {
            return false;
        }
        self.decoder.stop();

        info!(
            session = ?self.session.id(),
            %reason,
            scans = self.session.scans(),
            "Scan session stopped"
        );
        true
    }

    /// Start when idle, stop when scanning. Returns whether a session is running.
    pub async fn toggle(&mut self) -> bool {
        if self.session.is_active() {
            self.stop(StopReason::User);
            false
        } else {
            self.start().await
        }
    }

    /// Handle text reported by the decoder.
    ///
    /// Blank text and text arriving while no session is active are ignored. Returns
    /// whether the text was accepted.
    pub fn on_decoded(&mut self, text: &str) -> bool {
        if !self.session.is_active() {
            debug!("decode ignored, no active session");
            return false;
        }
        if text.trim().is_empty() {
            return false;
        }

        self.session.record(text);
        self.notifier.notify(text);
        debug!(session = ?self.session.id(), scans = self.session.scans(), "Code accepted");

        if self.settings.policy == ScanPolicy::StopOnFirstMatch {
            self.stop(StopReason::Success);
        }
        true
    }

    /// Wait for the next decoder or timeout event and apply it.
    ///
    /// Returns whether the event changed the session; events from an earlier
    /// session are discarded. Cancel-safe.
    pub async fn process_next(&mut self) -> bool {
        // The controller keeps a sender of its own, so the channel never closes
        match self.events_rx.recv().await {
            Some(event) => self.apply(event),
            None => false,
        }
    }

    /// Apply every event that is already queued without waiting.
    ///
    /// Returns how many events were received, including discarded ones.
    pub fn poll_pending(&mut self) -> usize {
        let mut received = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            received += 1;
            self.apply(event);
        }
        received
    }

    /// Drive events until the session is no longer active.
    pub async fn run_until_stopped(&mut self) {
        while self.session.is_active() {
            self.process_next().await;
        }
    }

    fn apply(&mut self, event: SessionEvent) -> bool {
        if !self.session.accepts(event.generation()) {
            debug!(
                generation = event.generation(),
                current = self.session.generation(),
                "Discarding stale session event"
            );
            return false;
        }

        match event {
            SessionEvent::Decoded { event, .. } => self.on_decoded(&event.text),
            SessionEvent::DecoderFailed { message, .. } => {
                self.session.fail(message);
                self.stop(StopReason::Failure)
            }
            SessionEvent::TimedOut { .. } => self.on_timeout(),
        }
    }

    fn on_timeout(&mut self) -> bool {
        let message = timeout_message(self.settings.timeout, self.session.scans());
        self.session.fail(message);
        self.stop(StopReason::Timeout)
    }
}

impl<D: DecoderAdapter, N: Notifier> Drop for SessionController<D, N> {
    fn drop(&mut self) {
        self.stop(StopReason::Unmount);
    }
}
