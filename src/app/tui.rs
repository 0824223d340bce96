use std::io::{self, Stdout};
use std::time::Duration;

use crossterm::event::{self, Event, KeyEventKind};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Clear, Gauge, Paragraph, Row, Table, TableState, Wrap};
use ratatui::{Frame, Terminal};

use super::opener::TabPlan;
use super::prompt::CompanyPicker;
use super::session::{Collaborators, SessionState};
use super::types::{Key, OpenField, OpenSettingsForm, Screen, TermEntry};
use super::ui_utils::{
    centered_rect, hint_line, label_style, menu_line, progress_ratio, run_status_style,
};
use super::validate::{RunStatus, ValidationHandle};

pub const TICK_RATE: Duration = Duration::from_millis(120);

pub fn draw_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    state: &mut SessionState,
    services: &mut Collaborators<'_>,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| render(f, state))?;
        if state.is_quit() {
            break;
        }

        if state.has_pending_work() {
            let profile = state.current_profile().name.clone();
            let mut redraw_error = None;
            state.perform_pending_work(services, |done, total| {
                if redraw_error.is_some() {
                    return;
                }
                if let Err(err) = terminal.draw(|f| render_open_progress(f, &profile, done, total))
                {
                    redraw_error = Some(err);
                }
            });
            if let Some(err) = redraw_error {
                return Err(err);
            }
            continue;
        }

        let ready = if state.needs_tick() {
            event::poll(TICK_RATE)?
        } else {
            true
        };
        if ready
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            state.handle_key(Key::from(key), services);
        }
    }
    Ok(())
}

fn frame_chunks(area: Rect) -> [Rect; 3] {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(4),
        ])
        .split(area);
    [chunks[0], chunks[1], chunks[2]]
}

pub fn render(f: &mut Frame, state: &SessionState) {
    let [header_area, body, footer_area] = frame_chunks(f.area());

    let profile = state.current_profile();
    let sep_style = Style::default().fg(Color::DarkGray);
    let header = Paragraph::new(Line::from(vec![
        Span::styled("Profile ", label_style()),
        Span::styled(
            profile.name.clone(),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled("  |  ", sep_style),
        Span::styled("URLs ", label_style()),
        Span::styled(
            profile.url_count().to_string(),
            Style::default().fg(Color::LightCyan),
        ),
        Span::styled("  |  ", sep_style),
        Span::styled("Search specs ", label_style()),
        Span::styled(
            if profile.has_search_specs() { "yes" } else { "no" },
            Style::default().fg(if profile.has_search_specs() {
                Color::Green
            } else {
                Color::DarkGray
            }),
        ),
    ]))
    .block(
        Block::default()
            .title("jobflare")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    f.render_widget(header, header_area);

    let hints: &[(&str, &str)] = match state.screen() {
        Screen::MainMenu => {
            render_main_menu(f, body, state);
            &[("o/f/g/v/p", "choose"), ("q", "quit")]
        }
        Screen::ProfileSelect { cursor } => {
            render_profiles(f, body, state, *cursor);
            &[("j/k", "move"), ("enter", "select"), ("b", "back"), ("q", "quit")]
        }
        Screen::OpenSettings(form) => {
            render_open_settings(f, body, form);
            &[("0-9", "edit"), ("enter", "confirm"), ("backspace", "erase"), ("b", "back")]
        }
        Screen::Opening(plan) => {
            render_opening(f, body, plan);
            &[]
        }
        Screen::Validating(handle) => {
            render_validation(f, body, handle);
            if handle.is_running() {
                &[("c", "cancel")]
            } else {
                &[("b/esc/enter", "back")]
            }
        }
        Screen::Fetching => {
            render_notice(f, body, "Fetching", "Fetching jobs from configured sources...");
            &[]
        }
        Screen::AiKeywords(entry) => {
            render_terms(f, body, "Step 1/3: Keywords", &state.draft().keywords, entry);
            term_hints(entry)
        }
        Screen::AiLocations(entry) => {
            render_terms(f, body, "Step 2/3: Locations", &state.draft().locations, entry);
            term_hints(entry)
        }
        Screen::AiCompanies(picker) => {
            render_companies(f, body, state, picker);
            &[
                ("j/k", "move"),
                ("</>", "page"),
                ("space/1-0", "toggle"),
                ("a/c", "all/none"),
                ("n", "generate"),
                ("b", "back"),
            ]
        }
        Screen::AiDisplay { scroll } => {
            render_prompt(f, body, &state.draft().prompt, *scroll);
            &[
                ("j/k", "scroll"),
                ("pgup/pgdn", "page"),
                ("c", "copy"),
                ("e", "edit"),
                ("b/esc/enter", "main menu"),
            ]
        }
        Screen::Quit => {
            render_notice(f, body, "Bye", "Shutting down...");
            &[]
        }
    };

    let mut footer_lines = vec![hint_line(hints)];
    if let Some(message) = state.message() {
        footer_lines.push(Line::from(Span::styled(
            message.to_string(),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )));
    }
    let footer = Paragraph::new(footer_lines)
        .block(Block::default().title("Keys").borders(Borders::ALL))
        .wrap(Wrap { trim: true });
    f.render_widget(footer, footer_area);
}

fn term_hints(entry: &TermEntry) -> &'static [(&'static str, &'static str)] {
    if entry.buffer.is_some() {
        &[("enter", "add"), ("esc", "cancel"), ("backspace", "erase")]
    } else {
        &[("a", "add"), ("c", "clear"), ("n", "next"), ("b", "back")]
    }
}

fn render_main_menu(f: &mut Frame, area: Rect, state: &SessionState) {
    let profile = state.current_profile();
    let mut lines = vec![
        menu_line("o", &format!("Open job URLs in browser ({})", profile.url_count())),
        menu_line("f", "Fetch jobs from search specs"),
        menu_line("g", "Generate AI search prompt"),
        menu_line("v", "Validate job URLs"),
        menu_line("p", &format!("Switch profile ({} loaded)", state.profiles().len())),
        menu_line("q", "Quit"),
    ];
    if !profile.has_search_specs() {
        lines[1] = Line::from(vec![
            Span::styled("[f] ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                "Fetch jobs (no search_specs.json)",
                Style::default().fg(Color::DarkGray),
            ),
        ]);
    }
    f.render_widget(
        Paragraph::new(lines).block(Block::default().title("Main menu").borders(Borders::ALL)),
        area,
    );
}

fn render_profiles(f: &mut Frame, area: Rect, state: &SessionState, cursor: usize) {
    let rows = state.profiles().iter().enumerate().map(|(idx, profile)| {
        let marker = if idx == state.profile_idx() { "*" } else { "" };
        Row::new(vec![
            Cell::from(marker),
            Cell::from(profile.name.clone()),
            Cell::from(profile.url_count().to_string()),
            Cell::from(if profile.has_search_specs() { "yes" } else { "-" }),
        ])
    });
    let table = Table::new(
        rows,
        [
            Constraint::Length(2),
            Constraint::Min(20),
            Constraint::Length(8),
            Constraint::Length(8),
        ],
    )
    .header(
        Row::new(vec!["", "Profile", "URLs", "Specs"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .row_highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .block(
        Block::default()
            .title(format!("Profiles ({})", state.profiles().len()))
            .borders(Borders::ALL),
    )
    .column_spacing(1);
    let mut table_state = TableState::default();
    table_state.select(Some(cursor));
    f.render_stateful_widget(table, area, &mut table_state);
}

fn render_open_settings(f: &mut Frame, area: Rect, form: &OpenSettingsForm) {
    let active = Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::BOLD);
    let field_line = |label: String, value: String, is_active: bool| {
        Line::from(vec![
            Span::styled(label, if is_active { active } else { label_style() }),
            Span::raw(value),
            Span::styled(if is_active { "_" } else { "" }, active),
        ])
    };

    let limit_value = match form.field {
        OpenField::Limit => form.buffer.clone(),
        OpenField::Delay => form.limit.to_string(),
    };
    let delay_value = match form.field {
        OpenField::Limit => String::new(),
        OpenField::Delay => form.buffer.clone(),
    };
    let lines = vec![
        Line::from(format!("{} URLs available", form.available)),
        Line::from(""),
        field_line(
            format!("Max tabs [1-{}] (default {}): ", form.available.max(1), form.default_limit),
            limit_value,
            form.field == OpenField::Limit,
        ),
        field_line(
            format!(
                "Delay ms [0-{}] (default {}): ",
                OpenSettingsForm::max_delay_ms(),
                form.default_delay_ms
            ),
            delay_value,
            form.field == OpenField::Delay,
        ),
    ];
    f.render_widget(
        Paragraph::new(lines).block(Block::default().title("Open tabs").borders(Borders::ALL)),
        area,
    );
}

fn render_opening(f: &mut Frame, area: Rect, plan: &TabPlan) {
    draw_open_gauge(f, area, 0, plan.limit);
}

fn render_open_progress(f: &mut Frame, profile: &str, done: usize, total: usize) {
    let area = f.area();
    f.render_widget(Clear, area);
    let inner = centered_rect(70, 40, area);
    f.render_widget(
        Paragraph::new(format!("Opening tabs for {profile}"))
            .block(Block::default().title("jobflare").borders(Borders::ALL)),
        area,
    );
    draw_open_gauge(f, inner, done, total);
}

fn draw_open_gauge(f: &mut Frame, area: Rect, done: usize, total: usize) {
    let gauge = Gauge::default()
        .block(Block::default().title("Opening tabs").borders(Borders::ALL))
        .gauge_style(
            Style::default()
                .fg(Color::Cyan)
                .bg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .ratio(progress_ratio(done, total))
        .label(format!("{done}/{total}"));
    f.render_widget(gauge, area);
}

fn render_validation(f: &mut Frame, area: Rect, handle: &ValidationHandle) {
    let counters = handle.counters();
    let status = handle.status();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(4)])
        .split(area);

    let ratio = progress_ratio(counters.completed, counters.total);
    let gauge = Gauge::default()
        .block(
            Block::default()
                .title(format!("Validating {}", handle.profile()))
                .borders(Borders::ALL),
        )
        .gauge_style(run_status_style(status).bg(Color::Black))
        .ratio(ratio)
        .label(format!(
            "{}/{} ({:.1}%)",
            counters.completed,
            counters.total,
            ratio * 100.0
        ));
    f.render_widget(gauge, chunks[0]);

    let mut lines = vec![
        Line::from(vec![
            Span::styled("Status  ", label_style()),
            Span::styled(status.label(), run_status_style(status)),
        ]),
        Line::from(vec![
            Span::styled("Valid   ", label_style()),
            Span::styled(counters.valid.to_string(), Style::default().fg(Color::Green)),
            Span::styled("   Failed  ", label_style()),
            Span::styled(counters.failed.to_string(), Style::default().fg(Color::Red)),
        ]),
    ];
    if let Some(at) = handle.finished_at() {
        lines.push(Line::from(vec![
            Span::styled("Finished ", label_style()),
            Span::raw(at.format("%Y-%m-%d %H:%M:%S").to_string()),
        ]));
    }
    match status {
        RunStatus::Done => lines.push(Line::from(
            "Wrote jobs_validated.txt and jobs_report.txt",
        )),
        RunStatus::Cancelled => lines.push(Line::from("Cancelled; previous results left untouched")),
        RunStatus::Error => {
            let message = handle.error().unwrap_or_else(|| "unknown error".to_string());
            lines.push(Line::from(Span::styled(
                format!("Error: {message}"),
                Style::default().fg(Color::Red),
            )));
        }
        RunStatus::Idle | RunStatus::Running => {}
    }
    f.render_widget(
        Paragraph::new(lines)
            .block(Block::default().title("Results").borders(Borders::ALL))
            .wrap(Wrap { trim: true }),
        chunks[1],
    );
}

fn render_notice(f: &mut Frame, area: Rect, title: &str, text: &str) {
    f.render_widget(
        Paragraph::new(text.to_string())
            .block(Block::default().title(title.to_string()).borders(Borders::ALL))
            .wrap(Wrap { trim: true }),
        area,
    );
}

fn render_terms(f: &mut Frame, area: Rect, title: &str, terms: &[String], entry: &TermEntry) {
    let mut lines = if terms.is_empty() {
        vec![Line::from(Span::styled(
            "(none)",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        terms
            .iter()
            .map(|term| Line::from(format!("  - {term}")))
            .collect::<Vec<_>>()
    };
    if let Some(buffer) = &entry.buffer {
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::styled("Add (comma separated): ", label_style()),
            Span::raw(buffer.clone()),
            Span::styled("_", Style::default().fg(Color::Cyan)),
        ]));
    }
    f.render_widget(
        Paragraph::new(lines)
            .block(Block::default().title(title.to_string()).borders(Borders::ALL))
            .wrap(Wrap { trim: true }),
        area,
    );
}

fn render_companies(f: &mut Frame, area: Rect, state: &SessionState, picker: &CompanyPicker) {
    let draft = state.draft();
    let total = draft.companies.len();
    let range = picker.batch_range(total);
    let start = range.start;
    let rows = range.clone().map(|idx| {
        let slot = (idx - start + 1) % 10;
        let mark = if draft.selected.get(idx).copied().unwrap_or(false) {
            "[x]"
        } else {
            "[ ]"
        };
        Row::new(vec![
            Cell::from(slot.to_string()),
            Cell::from(mark),
            Cell::from(draft.companies[idx].clone()),
        ])
    });
    let table = Table::new(
        rows,
        [
            Constraint::Length(2),
            Constraint::Length(4),
            Constraint::Min(20),
        ],
    )
    .row_highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .block(
        Block::default()
            .title(format!(
                "Step 3/3: Companies (page {}/{}, {} selected)",
                picker.batch + 1,
                CompanyPicker::batch_count(total).max(1),
                draft.selected_count()
            ))
            .borders(Borders::ALL),
    )
    .column_spacing(1);
    let mut table_state = TableState::default();
    if range.contains(&picker.cursor) {
        table_state.select(Some(picker.cursor - start));
    }
    f.render_stateful_widget(table, area, &mut table_state);
}

fn render_prompt(f: &mut Frame, area: Rect, prompt: &str, scroll: u16) {
    let total = prompt.lines().count();
    let lines = prompt.lines().map(Line::from).collect::<Vec<_>>();
    f.render_widget(
        Paragraph::new(lines)
            .block(
                Block::default()
                    .title(format!(
                        "Generated prompt (line {}/{total})",
                        (usize::from(scroll) + 1).min(total.max(1))
                    ))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Green)),
            )
            .wrap(Wrap { trim: false })
            .scroll((scroll, 0)),
        area,
    );
}
