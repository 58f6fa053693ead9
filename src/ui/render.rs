//! Scanner screen layout
//!
//! Everything drawn here is derived from a [`SessionView`] and the visible toasts;
//! the renderer keeps no state of its own.

use crate::notify::{Toast, ToastPosition};
use crate::session::SessionView;
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

const TOAST_HEIGHT: u16 = 3;
const TOAST_MAX_WIDTH: u16 = 48;

/// Draw the scanner screen.
pub fn render(frame: &mut Frame, view: &SessionView, toasts: &[Toast], position: ToastPosition) {
    let area = frame.area();

    let error_height = if view.last_error.is_some() { 3 } else { 0 };
    let [title, button, preview, result, error, footer] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(3),
        Constraint::Min(3),
        Constraint::Length(3),
        Constraint::Length(error_height),
        Constraint::Length(1),
    ])
    .areas(area);

    frame.render_widget(
        Paragraph::new("Scanner")
            .alignment(Alignment::Center)
            .style(Style::default().add_modifier(Modifier::BOLD)),
        title,
    );
    render_button(frame, view, button);
    if view.active {
        render_preview(frame, view, preview);
    }
    render_result(frame, view, result);
    if let Some(message) = &view.last_error {
        render_error(frame, message, error);
    }
    frame.render_widget(
        Paragraph::new("space/enter: start/stop   q: quit")
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center),
        footer,
    );

    render_toasts(frame, toasts, position, area);
}

fn render_button(frame: &mut Frame, view: &SessionView, area: Rect) {
    let accent = if view.active { Color::Red } else { Color::Green };
    let width = (view.button_label().len() as u16 + 6).min(area.width);
    let [button] = Layout::horizontal([Constraint::Length(width)])
        .flex(ratatui::layout::Flex::Center)
        .areas(area);

    frame.render_widget(
        Paragraph::new(view.button_label())
            .alignment(Alignment::Center)
            .style(Style::default().fg(accent).add_modifier(Modifier::BOLD))
            .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(accent))),
        button,
    );
}

fn render_preview(frame: &mut Frame, view: &SessionView, area: Rect) {
    let mut lines = vec![
        Line::from(vec![
            Span::styled("● ", Style::default().fg(Color::Red)),
            Span::raw(format!("Scanning {}", view.source)),
        ]),
        Line::from(format!("Mode: {}", view.policy.label())),
    ];
    if let Some(secs) = view.remaining_secs {
        lines.push(Line::from(format!("Auto-stop in {secs}s")));
    }
    if view.scans > 0 {
        lines.push(Line::from(format!("Codes read: {}", view.scans)));
    }

    frame.render_widget(
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title(" Preview ")),
        area,
    );
}

fn render_result(frame: &mut Frame, view: &SessionView, area: Rect) {
    frame.render_widget(
        Paragraph::new(view.result_line())
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::TOP)),
        area,
    );
}

fn render_error(frame: &mut Frame, message: &str, area: Rect) {
    frame.render_widget(
        Paragraph::new(message.to_string())
            .style(Style::default().fg(Color::Red).add_modifier(Modifier::BOLD))
            .wrap(Wrap { trim: true }),
        area,
    );
}

fn render_toasts(frame: &mut Frame, toasts: &[Toast], position: ToastPosition, area: Rect) {
    // Newest toast sits closest to the corner
    for (slot, toast) in toasts.iter().rev().enumerate() {
        let Some(rect) = toast_rect(area, slot as u16, &toast.message, position) else {
            break;
        };
        frame.render_widget(Clear, rect);
        frame.render_widget(
            Paragraph::new(Line::from(vec![
                Span::styled("✓ ", Style::default().fg(Color::Green)),
                Span::raw(toast.message.clone()),
            ]))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Green)),
            ),
            rect,
        );
    }
}

/// Rectangle of the toast in stack slot `slot`, or `None` once the stack runs off screen.
fn toast_rect(area: Rect, slot: u16, message: &str, position: ToastPosition) -> Option<Rect> {
    let width = (message.chars().count() as u16 + 4)
        .min(TOAST_MAX_WIDTH)
        .min(area.width);
    let offset = slot.checked_mul(TOAST_HEIGHT)?;
    if offset + TOAST_HEIGHT > area.height {
        return None;
    }

    let x = if position.is_left() {
        area.x
    } else {
        area.x + area.width - width
    };
    let y = if position.is_top() {
        area.y + offset
    } else {
        area.y + area.height - offset - TOAST_HEIGHT
    };
    Some(Rect::new(x, y, width, TOAST_HEIGHT))
}
