//! Session controller behaviour against a scripted decoder adapter

use async_trait::async_trait;
use qscan::notify::Notifier;
use qscan::session::DEFAULT_RESULT;
use qscan::{
    DecodeSender, DecoderAdapter, Error, Result, ScanPolicy, SessionController, SessionSettings,
    StopReason,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{self, Instant};

/// Shared view into a [`ScriptedDecoder`] after it was moved into a controller.
#[derive(Clone, Default)]
struct Script {
    sender: Arc<Mutex<Option<DecodeSender>>>,
    starts: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
}

impl Script {
    /// Push text through the sender of the most recent session.
    fn decode(&self, text: &str) -> bool {
        self.sender
            .lock()
            .expect("script mutex poisoned")
            .as_ref()
            .map(|sender| sender.decoded(text))
            .unwrap_or(false)
    }

    fn fail(&self, error: Error) -> bool {
        self.sender
            .lock()
            .expect("script mutex poisoned")
            .as_ref()
            .map(|sender| sender.failed(&error))
            .unwrap_or(false)
    }

    fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

struct ScriptedDecoder {
    script: Script,
    deny: bool,
    running: bool,
}

impl ScriptedDecoder {
    fn new() -> (Self, Script) {
        let script = Script::default();
        let decoder = Self {
            script: script.clone(),
            deny: false,
            running: false,
        };
        (decoder, script)
    }

    fn denied() -> (Self, Script) {
        let (mut decoder, script) = Self::new();
        decoder.deny = true;
        (decoder, script)
    }
}

#[async_trait]
impl DecoderAdapter for ScriptedDecoder {
    async fn start(&mut self, sender: DecodeSender) -> Result<()> {
        self.script.starts.fetch_add(1, Ordering::SeqCst);
        if self.deny {
            return Err(Error::PermissionDenied("/dev/video0".to_string()));
        }
        *self.script.sender.lock().expect("script mutex poisoned") = Some(sender);
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) {
        if self.running {
            self.script.releases.fetch_add(1, Ordering::SeqCst);
        }
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn label(&self) -> String {
        "scripted".to_string()
    }
}

#[derive(Clone, Default)]
struct RecordingNotifier {
    seen: Arc<Mutex<Vec<String>>>,
}

impl RecordingNotifier {
    fn seen(&self) -> Vec<String> {
        self.seen.lock().expect("notifier mutex poisoned").clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, text: &str) {
        self.seen
            .lock()
            .expect("notifier mutex poisoned")
            .push(text.to_string());
    }
}

fn controller(
    decoder: ScriptedDecoder,
    policy: ScanPolicy,
) -> (
    SessionController<ScriptedDecoder, RecordingNotifier>,
    RecordingNotifier,
) {
    let notifier = RecordingNotifier::default();
    let settings = SessionSettings {
        policy,
        timeout: SessionSettings::DEFAULT_TIMEOUT,
    };
    (
        SessionController::new(decoder, notifier.clone(), settings),
        notifier,
    )
}

#[tokio::test(start_paused = true)]
async fn start_resets_result_and_error() {
    let (decoder, _script) = ScriptedDecoder::new();
    let (mut controller, _notifier) = controller(decoder, ScanPolicy::StopOnFirstMatch);

    // Leave an error behind from a timed out session
    assert!(controller.start().await);
    controller.run_until_stopped().await;
    assert!(controller.session().last_error().is_some());

    assert!(controller.start().await);
    let session = controller.session();
    assert!(session.is_active());
    assert_eq!(session.last_result(), DEFAULT_RESULT);
    assert_eq!(session.last_error(), None);
    assert!(session.has_armed_timeout());
    assert!(controller.decoder().is_running());
}

#[tokio::test(start_paused = true)]
async fn decode_at_five_seconds_stops_on_first_match() {
    let (decoder, script) = ScriptedDecoder::new();
    let (mut controller, notifier) = controller(decoder, ScanPolicy::StopOnFirstMatch);

    assert!(controller.start().await);
    time::advance(Duration::from_secs(5)).await;
    assert!(script.decode("ABC123"));
    assert!(controller.process_next().await);

    let session = controller.session();
    assert!(!session.is_active());
    assert_eq!(session.last_result(), "ABC123");
    assert_eq!(session.last_error(), None);
    assert!(!session.has_armed_timeout());
    assert_eq!(notifier.seen(), vec!["ABC123".to_string()]);
    assert_eq!(script.releases(), 1);

    // Well past the original deadline nothing arrives any more
    time::advance(Duration::from_secs(120)).await;
    assert_eq!(controller.poll_pending(), 0);
    assert_eq!(controller.session().last_error(), None);
}

#[tokio::test(start_paused = true)]
async fn no_decode_times_out_after_one_minute() {
    let (decoder, script) = ScriptedDecoder::new();
    let (mut controller, notifier) = controller(decoder, ScanPolicy::StopOnFirstMatch);
    let started = Instant::now();

    assert!(controller.start().await);
    controller.run_until_stopped().await;

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(60));
    assert!(elapsed < Duration::from_secs(61));
    let session = controller.session();
    assert!(!session.is_active());
    assert_eq!(session.last_result(), DEFAULT_RESULT);
    assert_eq!(
        session.last_error(),
        Some("No barcode found after 1 minute.")
    );
    assert!(notifier.seen().is_empty());
    assert_eq!(script.releases(), 1);
}

#[tokio::test(start_paused = true)]
async fn still_active_just_before_the_deadline() {
    let (decoder, _script) = ScriptedDecoder::new();
    let (mut controller, _notifier) = controller(decoder, ScanPolicy::StopOnFirstMatch);

    assert!(controller.start().await);
    time::advance(Duration::from_secs(59)).await;
    assert_eq!(controller.poll_pending(), 0);
    assert!(controller.is_active());
    assert_eq!(controller.view().remaining_secs, Some(1));
}

#[tokio::test(start_paused = true)]
async fn continue_policy_collects_until_timeout() {
    let (decoder, script) = ScriptedDecoder::new();
    let (mut controller, notifier) = controller(decoder, ScanPolicy::ContinueUntilTimeout);

    assert!(controller.start().await);
    for code in ["A-1", "B-2", "C-3"] {
        time::advance(Duration::from_secs(10)).await;
        assert!(script.decode(code));
        assert!(controller.process_next().await);
        assert!(controller.is_active());
        assert_eq!(controller.session().last_result(), code);
    }
    assert_eq!(controller.session().scans(), 3);

    controller.run_until_stopped().await;
    let session = controller.session();
    assert!(!session.is_active());
    assert_eq!(session.last_result(), "C-3");
    assert_eq!(
        session.last_error(),
        Some("Scanning stopped after 1 minute.")
    );
    assert_eq!(notifier.seen(), vec!["A-1", "B-2", "C-3"]);
}

#[tokio::test]
async fn blank_text_is_ignored() {
    let (decoder, script) = ScriptedDecoder::new();
    let (mut controller, notifier) = controller(decoder, ScanPolicy::StopOnFirstMatch);

    assert!(controller.start().await);
    assert!(!controller.on_decoded(""));
    assert!(!controller.on_decoded("  \t\n"));
    assert!(script.decode("   "));
    assert!(!controller.process_next().await);

    assert!(controller.is_active());
    assert_eq!(controller.session().last_result(), DEFAULT_RESULT);
    assert!(notifier.seen().is_empty());
}

#[tokio::test]
async fn decode_while_inactive_is_ignored() {
    let (decoder, _script) = ScriptedDecoder::new();
    let (mut controller, notifier) = controller(decoder, ScanPolicy::StopOnFirstMatch);

    assert!(!controller.on_decoded("ABC123"));
    assert_eq!(controller.session().last_result(), DEFAULT_RESULT);
    assert!(notifier.seen().is_empty());
}

#[tokio::test]
async fn stop_twice_is_a_noop() {
    let (decoder, script) = ScriptedDecoder::new();
    let (mut controller, _notifier) = controller(decoder, ScanPolicy::StopOnFirstMatch);

    assert!(controller.start().await);
    assert!(controller.stop(StopReason::User));
    assert!(!controller.stop(StopReason::User));
    assert_eq!(script.releases(), 1);
    assert!(!controller.session().has_armed_timeout());

    // Stopping a controller that never started is just as harmless
    let (decoder, script) = ScriptedDecoder::new();
    let (mut idle, _notifier) = self::controller(decoder, ScanPolicy::StopOnFirstMatch);
    assert!(!idle.stop(StopReason::User));
    assert_eq!(script.releases(), 0);
}

#[tokio::test(start_paused = true)]
async fn start_failure_reports_error_without_timeout() {
    let (decoder, script) = ScriptedDecoder::denied();
    let (mut controller, _notifier) = controller(decoder, ScanPolicy::StopOnFirstMatch);

    assert!(!controller.start().await);
    let session = controller.session();
    assert!(!session.is_active());
    assert!(!session.has_armed_timeout());
    assert_eq!(
        session.last_error(),
        Some("Camera permission denied: /dev/video0")
    );
    assert_eq!(script.starts(), 1);

    time::advance(Duration::from_secs(120)).await;
    assert_eq!(controller.poll_pending(), 0);
}

#[tokio::test]
async fn start_while_active_keeps_session() {
    let (decoder, script) = ScriptedDecoder::new();
    let (mut controller, _notifier) = controller(decoder, ScanPolicy::ContinueUntilTimeout);

    assert!(controller.start().await);
    assert!(script.decode("FIRST"));
    assert!(controller.process_next().await);
    let id = controller.session().id();

    assert!(controller.start().await);
    assert_eq!(script.starts(), 1);
    assert_eq!(controller.session().id(), id);
    assert_eq!(controller.session().last_result(), "FIRST");
}

#[tokio::test]
async fn events_from_previous_session_are_discarded() {
    let (decoder, script) = ScriptedDecoder::new();
    let (mut controller, notifier) = controller(decoder, ScanPolicy::ContinueUntilTimeout);

    assert!(controller.start().await);
    let stale = script
        .sender
        .lock()
        .expect("script mutex poisoned")
        .clone()
        .expect("sender");
    controller.stop(StopReason::User);

    assert!(controller.start().await);
    assert!(stale.decoded("OLD"));
    assert!(!controller.process_next().await);
    assert_eq!(controller.session().last_result(), DEFAULT_RESULT);

    assert!(script.decode("NEW"));
    assert!(controller.process_next().await);
    assert_eq!(controller.session().last_result(), "NEW");
    assert_eq!(notifier.seen(), vec!["NEW"]);
}

#[tokio::test]
async fn source_loss_stops_with_error() {
    let (decoder, script) = ScriptedDecoder::new();
    let (mut controller, _notifier) = controller(decoder, ScanPolicy::ContinueUntilTimeout);

    assert!(controller.start().await);
    assert!(script.fail(Error::FrameCapture("device unplugged".to_string())));
    assert!(controller.process_next().await);

    assert!(!controller.is_active());
    assert!(!controller.session().has_armed_timeout());
    assert!(
        controller
            .session()
            .last_error()
            .is_some_and(|message| message.contains("device unplugged"))
    );
    assert_eq!(script.releases(), 1);
}

#[tokio::test]
async fn toggle_starts_and_stops() {
    let (decoder, script) = ScriptedDecoder::new();
    let (mut controller, _notifier) = controller(decoder, ScanPolicy::StopOnFirstMatch);

    assert!(controller.toggle().await);
    assert_eq!(controller.view().button_label(), "Stop Scanner");
    assert!(!controller.toggle().await);
    assert_eq!(controller.view().button_label(), "Start Scanner");
    assert_eq!(script.releases(), 1);
}

#[tokio::test]
async fn dropping_controller_releases_decoder() {
    let (decoder, script) = ScriptedDecoder::new();
    let (mut controller, _notifier) = controller(decoder, ScanPolicy::StopOnFirstMatch);

    assert!(controller.start().await);
    drop(controller);
    assert_eq!(script.releases(), 1);
}

#[tokio::test(start_paused = true)]
async fn decode_queued_behind_timeout_is_discarded() {
    let (decoder, script) = ScriptedDecoder::new();
    let (mut controller, notifier) = controller(decoder, ScanPolicy::StopOnFirstMatch);

    assert!(controller.start().await);
    // The timer fires at 60s and queues its event before the decode below
    time::sleep(Duration::from_secs(61)).await;
    assert!(script.decode("X"));

    assert_eq!(controller.poll_pending(), 2);
    let session = controller.session();
    assert!(!session.is_active());
    assert_eq!(session.last_result(), DEFAULT_RESULT);
    assert_eq!(
        session.last_error(),
        Some("No barcode found after 1 minute.")
    );
    assert!(notifier.seen().is_empty());
    assert_eq!(script.releases(), 1);
}

#[tokio::test(start_paused = true)]
async fn timeout_queued_behind_decode_is_discarded() {
    let (decoder, script) = ScriptedDecoder::new();
    let (mut controller, notifier) = controller(decoder, ScanPolicy::StopOnFirstMatch);

    assert!(controller.start().await);
    assert!(script.decode("ABC123"));
    // Let the timer queue its event behind the unprocessed decode
    time::sleep(Duration::from_secs(61)).await;

    assert_eq!(controller.poll_pending(), 2);
    let session = controller.session();
    assert!(!session.is_active());
    assert_eq!(session.last_result(), "ABC123");
    assert_eq!(session.last_error(), None);
    assert_eq!(notifier.seen(), vec!["ABC123"]);
    assert_eq!(script.releases(), 1);
}

#[tokio::test(start_paused = true)]
async fn oversized_timeout_does_not_overflow() {
    let (decoder, _script) = ScriptedDecoder::new();
    let settings = SessionSettings {
        policy: ScanPolicy::StopOnFirstMatch,
        timeout: Duration::MAX,
    };
    let mut controller = SessionController::new(decoder, RecordingNotifier::default(), settings);

    assert!(controller.start().await);
    assert!(controller.session().has_armed_timeout());
    time::advance(Duration::from_secs(3600)).await;
    assert_eq!(controller.poll_pending(), 0);
    assert!(controller.is_active());
}
