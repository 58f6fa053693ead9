//! Helpers for rendering session state outside the interactive UI

use crate::notify::Toast;
use crate::session::SessionView;
use serde_json::{Value, json};

/// Combined structured and human-readable representation of a session
#[derive(Debug, Clone)]
pub struct RenderedSession {
    /// Structured JSON representation for downstream consumers
    pub json: Value,
    /// Human-readable lines for terminal presentation
    pub human: Vec<String>,
}

/// Render a session snapshot into both JSON and human-readable forms.
pub fn render_session(view: &SessionView) -> RenderedSession {
    let mut human = vec![format!("[{}]", view.button_label())];

    if view.active {
        let remaining = view
            .remaining_secs
            .map(|secs| format!(", {secs}s left"))
            .unwrap_or_default();
        human.push(format!("  Scanning {} ({}{})", view.source, view.policy.label(), remaining));
    }

    human.push(format!("  {}", view.result_line()));

    if let Some(error) = &view.last_error {
        human.push(format!("  Error: {error}"));
    }

    RenderedSession {
        json: session_value(view),
        human,
    }
}

/// Structured JSON representation of a session snapshot.
pub fn session_value(view: &SessionView) -> Value {
    json!({
        "active": view.active,
        "last_result": view.last_result,
        "last_error": view.last_error,
        "scans": view.scans,
        "policy": view.policy,
        "source": view.source,
        "remaining_secs": view.remaining_secs,
    })
}

/// Human-readable line for a toast
pub fn toast_line(toast: &Toast) -> String {
    format!("✓ {}", toast.message)
}

/// Structured JSON representation of a toast
pub fn toast_value(toast: &Toast) -> Value {
    json!({ "toast": toast.message })
}
