use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

use super::validate::RunStatus;

pub fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

pub fn progress_ratio(done: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (done as f64 / total as f64).clamp(0.0, 1.0)
    }
}

pub fn hotkey_style() -> Style {
    Style::default()
        .fg(Color::White)
        .add_modifier(Modifier::BOLD)
}

pub fn label_style() -> Style {
    Style::default().fg(Color::Gray)
}

pub fn menu_line(key: &str, label: &str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("[{key}] "), hotkey_style()),
        Span::styled(label.to_string(), label_style()),
    ])
}

pub fn hint_line(hints: &[(&str, &str)]) -> Line<'static> {
    let mut spans = Vec::with_capacity(hints.len() * 2);
    for (key, action) in hints {
        spans.push(Span::styled(key.to_string(), hotkey_style()));
        spans.push(Span::styled(format!(" {action}  "), label_style()));
    }
    Line::from(spans)
}

pub fn run_status_style(status: RunStatus) -> Style {
    match status {
        RunStatus::Idle | RunStatus::Running => Style::default().fg(Color::Cyan),
        RunStatus::Done => Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD),
        RunStatus::Cancelled => Style::default().fg(Color::Yellow),
        RunStatus::Error => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
    }
}
