use log::{info, warn};

use super::data_io::Profile;
use super::fetch::{FetchError, JobFetcher, SearchSpecs};
use super::opener::{Desktop, TabPlan, open_tabs};
use super::prompt::{CompanyPicker, PromptDraft, add_terms};
use super::types::{Key, OpenSettingsForm, Screen, ScreenKind, TermEntry};
use super::validate::ValidationEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TabDefaults {
    pub limit: usize,
    pub delay_ms: u64,
}

pub struct Collaborators<'a> {
    pub engine: &'a mut ValidationEngine,
    pub desktop: &'a dyn Desktop,
    pub fetcher: &'a dyn JobFetcher,
}

enum Transition {
    Stay(Screen),
    Enter(Screen),
    Back,
    Return(ScreenKind),
}

const PROMPT_PAGE: u16 = 10;

pub struct SessionState {
    profiles: Vec<Profile>,
    profile_idx: usize,
    screen: Screen,
    prev: ScreenKind,
    message: Option<String>,
    draft: PromptDraft,
    tab_defaults: TabDefaults,
}

impl SessionState {
    pub fn new(profiles: Vec<Profile>, profile_idx: usize, tab_defaults: TabDefaults) -> Option<Self> {
        if profiles.is_empty() {
            return None;
        }
        let profile_idx = profile_idx.min(profiles.len() - 1);
        Some(Self {
            profiles,
            profile_idx,
            screen: Screen::MainMenu,
            prev: ScreenKind::MainMenu,
            message: None,
            draft: PromptDraft::default(),
            tab_defaults,
        })
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn screen_kind(&self) -> ScreenKind {
        self.screen.kind()
    }

    pub fn previous_screen(&self) -> ScreenKind {
        self.prev
    }

    pub fn is_quit(&self) -> bool {
        matches!(self.screen, Screen::Quit)
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn profile_idx(&self) -> usize {
        self.profile_idx
    }

    pub fn current_profile(&self) -> &Profile {
        &self.profiles[self.profile_idx]
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn draft(&self) -> &PromptDraft {
        &self.draft
    }

    /// True while the render step has to poll a running validation.
    pub fn needs_tick(&self) -> bool {
        matches!(&self.screen, Screen::Validating(handle) if handle.is_running())
    }

    pub fn has_pending_work(&self) -> bool {
        matches!(self.screen, Screen::Opening(_) | Screen::Fetching)
    }

    fn notify(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }

    fn apply(&mut self, from: ScreenKind, transition: Transition) {
        match transition {
            Transition::Stay(screen) => self.screen = screen,
            Transition::Enter(screen) => {
                self.prev = from;
                self.screen = screen;
            }
            Transition::Back => {
                let target = self.prev;
                self.return_to(target);
            }
            Transition::Return(kind) => self.return_to(kind),
        }
    }

    fn return_to(&mut self, kind: ScreenKind) {
        self.screen = self.fresh_screen(kind);
        self.prev = back_target(kind);
    }

    fn fresh_screen(&self, kind: ScreenKind) -> Screen {
        match kind {
            ScreenKind::ProfileSelect => Screen::ProfileSelect {
                cursor: self.profile_idx,
            },
            ScreenKind::OpenSettings => Screen::OpenSettings(self.open_form()),
            ScreenKind::AiKeywords => Screen::AiKeywords(TermEntry::default()),
            ScreenKind::AiLocations => Screen::AiLocations(TermEntry::default()),
            ScreenKind::AiCompanies => Screen::AiCompanies(CompanyPicker::default()),
            ScreenKind::AiDisplay => Screen::AiDisplay { scroll: 0 },
            ScreenKind::Quit => Screen::Quit,
            ScreenKind::MainMenu
            | ScreenKind::Opening
            | ScreenKind::Validating
            | ScreenKind::Fetching => Screen::MainMenu,
        }
    }

    fn open_form(&self) -> OpenSettingsForm {
        OpenSettingsForm::new(
            self.current_profile().url_count(),
            self.tab_defaults.limit,
            self.tab_defaults.delay_ms,
        )
    }

    /// The one-shot message is cleared here, not on render, so polled frames keep it.
    pub fn handle_key(&mut self, key: Key, services: &mut Collaborators<'_>) {
        self.message = None;
        let from = self.screen.kind();
        let screen = std::mem::replace(&mut self.screen, Screen::MainMenu);

        if key == Key::Interrupt {
            if let Screen::Validating(handle) = &screen {
                handle.cancel();
            }
            self.apply(from, Transition::Enter(Screen::Quit));
            return;
        }

        let transition = match screen {
            Screen::MainMenu => self.on_main_menu(key.command(), services),
            Screen::ProfileSelect { cursor } => self.on_profile_select(cursor, key.command()),
            Screen::OpenSettings(form) => self.on_open_settings(form, key),
            Screen::Validating(handle) => match key.command() {
                Key::Char('c') if handle.is_running() => {
                    handle.cancel();
                    Transition::Stay(Screen::Validating(handle))
                }
                Key::Char('b') | Key::Esc | Key::Enter if !handle.is_running() => {
                    self.profiles[self.profile_idx].reload();
                    Transition::Back
                }
                _ => Transition::Stay(Screen::Validating(handle)),
            },
            Screen::AiKeywords(entry) => self.on_terms(entry, key, ScreenKind::AiKeywords),
            Screen::AiLocations(entry) => self.on_terms(entry, key, ScreenKind::AiLocations),
            Screen::AiCompanies(picker) => self.on_companies(picker, key.command()),
            Screen::AiDisplay { scroll } => {
                self.on_prompt_display(scroll, key.command(), services.desktop)
            }
            // Work screens and quit ignore keys.
            other @ (Screen::Opening(_) | Screen::Fetching | Screen::Quit) => {
                Transition::Stay(other)
            }
        };
        self.apply(from, transition);
    }

    fn on_main_menu(&mut self, key: Key, services: &mut Collaborators<'_>) -> Transition {
        let profile = &self.profiles[self.profile_idx];
        match key {
            Key::Char('o') => {
                if profile.urls.is_empty() {
                    self.notify("No URLs to open");
                    return Transition::Stay(Screen::MainMenu);
                }
                Transition::Enter(Screen::OpenSettings(self.open_form()))
            }
            Key::Char('f') => {
                if !profile.has_search_specs() {
                    self.notify(FetchError::NoSearchSpecs.to_string());
                    return Transition::Stay(Screen::MainMenu);
                }
                Transition::Enter(Screen::Fetching)
            }
            Key::Char('g') => {
                let specs = profile.search_specs.as_deref().and_then(|path| {
                    SearchSpecs::load(path)
                        .map_err(|err| warn!("ignoring search specs: {err}"))
                        .ok()
                });
                self.draft = PromptDraft::from_specs(specs.as_ref());
                Transition::Enter(Screen::AiKeywords(TermEntry::default()))
            }
            Key::Char('v') => match services.engine.start(profile) {
                Ok(handle) => Transition::Enter(Screen::Validating(handle)),
                Err(err) => {
                    self.notify(err.to_string());
                    Transition::Stay(Screen::MainMenu)
                }
            },
            Key::Char('p') => Transition::Enter(Screen::ProfileSelect {
                cursor: self.profile_idx,
            }),
            Key::Char('q') => Transition::Enter(Screen::Quit),
            _ => Transition::Stay(Screen::MainMenu),
        }
    }

    fn on_profile_select(&mut self, cursor: usize, key: Key) -> Transition {
        let last = self.profiles.len() - 1;
        match key {
            Key::Char('j') | Key::Down => Transition::Stay(Screen::ProfileSelect {
                cursor: (cursor + 1).min(last),
            }),
            Key::Char('k') | Key::Up => Transition::Stay(Screen::ProfileSelect {
                cursor: cursor.saturating_sub(1),
            }),
            Key::Enter => {
                self.profile_idx = cursor.min(last);
                let profile = &mut self.profiles[self.profile_idx];
                profile.reload();
                info!("switched to profile '{}'", profile.name);
                Transition::Return(ScreenKind::MainMenu)
            }
            Key::Char('b') | Key::Esc => Transition::Back,
            Key::Char('q') => Transition::Enter(Screen::Quit),
            _ => Transition::Stay(Screen::ProfileSelect { cursor }),
        }
    }

    fn on_open_settings(&mut self, mut form: OpenSettingsForm, key: Key) -> Transition {
        match key {
            Key::Char(ch) if ch.is_ascii_digit() => form.push_digit(ch),
            Key::Backspace => form.backspace(),
            Key::Enter => {
                if let Some(plan) = form.commit() {
                    return Transition::Enter(Screen::Opening(plan));
                }
            }
            Key::Char('b') | Key::Char('B') | Key::Esc => return Transition::Back,
            _ => {}
        }
        Transition::Stay(Screen::OpenSettings(form))
    }

    fn on_terms(&mut self, mut entry: TermEntry, key: Key, kind: ScreenKind) -> Transition {
        let wrap = |entry: TermEntry| match kind {
            ScreenKind::AiLocations => Screen::AiLocations(entry),
            _ => Screen::AiKeywords(entry),
        };
        let terms = match kind {
            ScreenKind::AiLocations => &mut self.draft.locations,
            _ => &mut self.draft.keywords,
        };

        if let Some(mut buffer) = entry.buffer.take() {
            match key {
                Key::Enter => add_terms(terms, &buffer),
                Key::Esc => {}
                Key::Backspace => {
                    buffer.pop();
                    entry.buffer = Some(buffer);
                }
                Key::Char(ch) if !ch.is_control() => {
                    buffer.push(ch);
                    entry.buffer = Some(buffer);
                }
                _ => entry.buffer = Some(buffer),
            }
            return Transition::Stay(wrap(entry));
        }

        match key.command() {
            Key::Char('a') => {
                entry.buffer = Some(String::new());
                Transition::Stay(wrap(entry))
            }
            Key::Char('c') => {
                terms.clear();
                Transition::Stay(wrap(entry))
            }
            Key::Char('n') => match kind {
                ScreenKind::AiLocations => {
                    Transition::Enter(Screen::AiCompanies(CompanyPicker::default()))
                }
                _ => Transition::Enter(Screen::AiLocations(TermEntry::default())),
            },
            Key::Char('b') | Key::Esc => match kind {
                ScreenKind::AiLocations => Transition::Return(ScreenKind::AiKeywords),
                _ => Transition::Return(ScreenKind::MainMenu),
            },
            _ => Transition::Stay(wrap(entry)),
        }
    }

    fn on_companies(&mut self, mut picker: CompanyPicker, key: Key) -> Transition {
        let total = self.draft.companies.len();
        match key {
            Key::Char('j') | Key::Down => picker.move_down(total),
            Key::Char('k') | Key::Up => picker.move_up(total),
            Key::Char('<') | Key::Char(',') | Key::Left => picker.prev_batch(),
            Key::Char('>') | Key::Char('.') | Key::Right => picker.next_batch(total),
            Key::Char(' ') => {
                if picker.batch_range(total).contains(&picker.cursor) {
                    self.draft.toggle(picker.cursor);
                }
            }
            Key::Char(ch) if ch.is_ascii_digit() => {
                let digit = ch.to_digit(10).unwrap_or_default();
                if let Some(idx) = picker.index_for_digit(digit, total) {
                    self.draft.toggle(idx);
                }
            }
            Key::Char('a') => self.draft.select_all(true),
            Key::Char('c') => self.draft.select_all(false),
            Key::Char('n') => {
                self.draft.generate();
                return Transition::Enter(Screen::AiDisplay { scroll: 0 });
            }
            Key::Char('b') | Key::Esc => return Transition::Return(ScreenKind::AiLocations),
            _ => {}
        }
        Transition::Stay(Screen::AiCompanies(picker))
    }

    fn on_prompt_display(&mut self, scroll: u16, key: Key, desktop: &dyn Desktop) -> Transition {
        let last_line = u16::try_from(self.draft.prompt.lines().count().saturating_sub(1))
            .unwrap_or(u16::MAX);
        let scrolled = |scroll: u16| {
            Transition::Stay(Screen::AiDisplay {
                scroll: scroll.min(last_line),
            })
        };
        match key {
            Key::Char('c') => {
                match desktop.copy_text(&self.draft.prompt) {
                    Ok(()) => self.notify("Prompt copied to clipboard!"),
                    Err(err) => {
                        warn!("clipboard copy failed: {err}");
                        self.notify("Failed to copy - manually select and copy");
                    }
                }
                scrolled(scroll)
            }
            Key::Char('j') | Key::Down => scrolled(scroll.saturating_add(1)),
            Key::Char('k') | Key::Up => scrolled(scroll.saturating_sub(1)),
            Key::PageDown => scrolled(scroll.saturating_add(PROMPT_PAGE)),
            Key::PageUp => scrolled(scroll.saturating_sub(PROMPT_PAGE)),
            Key::Char('e') => Transition::Enter(Screen::AiKeywords(TermEntry::default())),
            Key::Char('b') | Key::Esc | Key::Enter => Transition::Return(ScreenKind::MainMenu),
            _ => scrolled(scroll),
        }
    }

    /// Runs the synchronous unit of work of the tab-opening or fetching screen
    /// and returns to the main menu. `on_progress` receives `(done, total)`
    /// after each opened tab.
    pub fn perform_pending_work(
        &mut self,
        services: &mut Collaborators<'_>,
        on_progress: impl FnMut(usize, usize),
    ) {
        match std::mem::replace(&mut self.screen, Screen::MainMenu) {
            Screen::Opening(plan) => self.run_opening(plan, services.desktop, on_progress),
            Screen::Fetching => self.run_fetch(services.fetcher),
            other => {
                self.screen = other;
                return;
            }
        }
        self.prev = ScreenKind::MainMenu;
    }

    fn run_opening(
        &mut self,
        plan: TabPlan,
        desktop: &dyn Desktop,
        on_progress: impl FnMut(usize, usize),
    ) {
        let profile = self.current_profile();
        let limit = plan.limit.min(profile.urls.len());
        let urls = profile.urls[..limit].to_vec();
        let summary = open_tabs(desktop, &urls, plan.delay, on_progress);
        self.notify(summary.message());
    }

    fn run_fetch(&mut self, fetcher: &dyn JobFetcher) {
        let profile = &mut self.profiles[self.profile_idx];
        let Some(specs) = profile.search_specs.clone() else {
            self.notify(FetchError::NoSearchSpecs.to_string());
            return;
        };
        match fetcher.fetch(&specs, &profile.dir) {
            Ok(summary) => {
                profile.reload();
                self.notify(format!("Fetched {} jobs", summary.written));
            }
            Err(err) => {
                warn!("fetch failed for profile '{}': {err}", profile.name);
                self.notify(format!("Fetch failed: {err}"));
            }
        }
    }
}

/// Where `b` leads from a screen reached by going back. The prompt builder
/// steps always unwind in order; everything else returns to the main menu.
fn back_target(kind: ScreenKind) -> ScreenKind {
    match kind {
        ScreenKind::AiLocations => ScreenKind::AiKeywords,
        ScreenKind::AiCompanies => ScreenKind::AiLocations,
        _ => ScreenKind::MainMenu,
    }
}
