//! Interactive terminal loop
//!
//! Takes over the terminal (raw mode, alternate screen), then multiplexes key
//! presses, session events and a redraw tick until the user quits. The terminal is
//! restored on every exit path, including panics.

use crate::decoder::DecoderAdapter;
use crate::error::Result;
use crate::notify::{Notifier, ToastPosition, ToastQueue};
use crate::session::{SessionController, StopReason};
use crate::ui::render::render;
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::CrosstermBackend;
use std::io::{self, Stdout};
use std::panic;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};

type Terminal = ratatui::Terminal<CrosstermBackend<Stdout>>;

/// Redraw cadence; keeps the countdown and toast expiry current
const REDRAW_INTERVAL: Duration = Duration::from_millis(250);

/// How long the input thread blocks before checking whether the UI is gone
const INPUT_POLL: Duration = Duration::from_millis(100);

/// What a key press asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiAction {
    /// Start or stop scanning
    Toggle,
    /// Leave the UI
    Quit,
}

/// Map a key press to an action
pub fn key_action(key: KeyEvent) -> Option<UiAction> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(UiAction::Quit)
        }
        KeyCode::Char(' ') | KeyCode::Enter | KeyCode::Char('s') => Some(UiAction::Toggle),
        KeyCode::Char('q') | KeyCode::Esc => Some(UiAction::Quit),
        _ => None,
    }
}

/// Run the scanner screen until the user quits.
pub async fn run<D, N>(
    controller: &mut SessionController<D, N>,
    toasts: &ToastQueue,
    position: ToastPosition,
) -> Result<()>
where
    D: DecoderAdapter,
    N: Notifier,
{
    let _hook = PanicHookGuard::install(|| {
        let _ = restore_terminal();
    });

    let mut terminal = setup_terminal()?;
    let result = event_loop(&mut terminal, controller, toasts, position).await;
    controller.stop(StopReason::Unmount);

    restore_terminal()?;
    result
}

type PanicHook = Box<dyn Fn(&panic::PanicHookInfo<'_>) + Sync + Send + 'static>;

/// Runs `cleanup` before the previous panic hook while alive; puts the previous hook
/// back on drop.
struct PanicHookGuard {
    previous: Arc<PanicHook>,
}

impl PanicHookGuard {
    fn install(cleanup: fn()) -> Self {
        let previous = Arc::new(panic::take_hook());
        let chained = Arc::clone(&previous);
        panic::set_hook(Box::new(move |info| {
            cleanup();
            chained(info);
        }));
        Self { previous }
    }
}

impl Drop for PanicHookGuard {
    fn drop(&mut self) {
        // set_hook panics when called from a panicking thread
        if std::thread::panicking() {
            return;
        }
        let previous = Arc::clone(&self.previous);
        panic::set_hook(Box::new(move |info| previous(info)));
    }
}

async fn event_loop<D, N>(
    terminal: &mut Terminal,
    controller: &mut SessionController<D, N>,
    toasts: &ToastQueue,
    position: ToastPosition,
) -> Result<()>
where
    D: DecoderAdapter,
    N: Notifier,
{
    let mut keys = spawn_input_thread();
    let mut redraw = time::interval(REDRAW_INTERVAL);
    redraw.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let view = controller.view();
        let visible = toasts.visible();
        terminal.draw(|frame| render(frame, &view, &visible, position))?;

        tokio::select! {
            key = keys.recv() => match key {
                Some(key) => match key_action(key) {
                    Some(UiAction::Toggle) => {
                        controller.toggle().await;
                    }
                    Some(UiAction::Quit) => return Ok(()),
                    None => {}
                },
                None => return Ok(()),
            },
            _ = controller.process_next() => {}
            _ = redraw.tick() => {}
        }
    }
}

/// Read terminal key events on a blocking thread and forward them.
fn spawn_input_thread() -> mpsc::Receiver<KeyEvent> {
    let (tx, rx) = mpsc::channel(32);
    let spawned = std::thread::Builder::new()
        .name("qscan-input".to_string())
        .spawn(move || {
            loop {
                if tx.is_closed() {
                    break;
                }
                match event::poll(INPUT_POLL) {
                    Ok(true) => match event::read() {
                        Ok(Event::Key(key)) => {
                            if tx.blocking_send(key).is_err() {
                                break;
                            }
                        }
                        Ok(_) => {}
                        Err(err) => {
                            tracing::warn!("Terminal input error: {err}");
                            break;
                        }
                    },
                    Ok(false) => {}
                    Err(err) => {
                        tracing::warn!("Terminal poll error: {err}");
                        break;
                    }
                }
            }
        });
    if let Err(err) = spawned {
        // The sender was dropped with the closure, so the UI loop ends right away
        tracing::error!("Failed to spawn input thread: {err}");
    }
    rx
}

fn setup_terminal() -> Result<Terminal> {
    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, cursor::Hide)?;
    Ok(ratatui::Terminal::new(CrosstermBackend::new(stdout))?)
}

fn restore_terminal() -> io::Result<()> {
    terminal::disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen, cursor::Show)
}
