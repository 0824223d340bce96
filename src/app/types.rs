use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use super::opener::{
    DEFAULT_DELAY_MS, DEFAULT_TAB_LIMIT, MAX_DELAY_MS, TabPlan, clamp_delay_ms, clamp_limit,
};
use super::prompt::CompanyPicker;
use super::validate::ValidationHandle;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "jobflare",
    version,
    about = "Manage, validate and open job posting links grouped into profiles"
)]
pub struct Cli {
    /// Job list to load; selects the profile that owns it.
    #[arg(value_name = "FILE")]
    pub file: Option<PathBuf>,

    #[arg(long, value_name = "DIR")]
    pub profiles_dir: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    #[arg(long, value_name = "SECS", default_value_t = 8)]
    pub timeout_secs: u64,

    #[arg(long, value_name = "SECS", default_value_t = 60)]
    pub fetch_timeout_secs: u64,

    #[arg(long, value_name = "N", default_value_t = DEFAULT_TAB_LIMIT)]
    pub tab_limit: usize,

    #[arg(long, value_name = "MS", default_value_t = DEFAULT_DELAY_MS)]
    pub delay_ms: u64,

    #[arg(long, value_name = "APP", default_value = "Google Chrome")]
    pub browser: String,

    #[arg(long, value_name = "UA")]
    pub user_agent: Option<String>,

    #[arg(long, value_name = "FILE", default_value = "jobflare.log")]
    pub log_file: PathBuf,

    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Up,
    Down,
    Left,
    Right,
    PageUp,
    PageDown,
    Enter,
    Esc,
    Backspace,
    Interrupt,
    Other,
}

impl Key {
    /// Command keys are case-insensitive; text entry uses the raw key.
    pub fn command(self) -> Key {
        match self {
            Key::Char(ch) => Key::Char(ch.to_ascii_lowercase()),
            other => other,
        }
    }
}

impl From<KeyEvent> for Key {
    fn from(event: KeyEvent) -> Self {
        let control = event.modifiers.contains(KeyModifiers::CONTROL);
        match event.code {
            KeyCode::Char('c') | KeyCode::Char('C') if control => Key::Interrupt,
            KeyCode::Char(_) if control || event.modifiers.contains(KeyModifiers::ALT) => {
                Key::Other
            }
            KeyCode::Char(ch) => Key::Char(ch),
            KeyCode::Up => Key::Up,
            KeyCode::Down => Key::Down,
            KeyCode::Left => Key::Left,
            KeyCode::Right => Key::Right,
            KeyCode::PageUp => Key::PageUp,
            KeyCode::PageDown => Key::PageDown,
            KeyCode::Enter => Key::Enter,
            KeyCode::Esc => Key::Esc,
            KeyCode::Backspace => Key::Backspace,
            _ => Key::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenKind {
    MainMenu,
    ProfileSelect,
    OpenSettings,
    Opening,
    Validating,
    Fetching,
    AiKeywords,
    AiLocations,
    AiCompanies,
    AiDisplay,
    Quit,
}

#[derive(Debug, Clone)]
pub enum Screen {
    MainMenu,
    ProfileSelect { cursor: usize },
    OpenSettings(OpenSettingsForm),
    Opening(TabPlan),
    Validating(ValidationHandle),
    Fetching,
    AiKeywords(TermEntry),
    AiLocations(TermEntry),
    AiCompanies(CompanyPicker),
    AiDisplay { scroll: u16 },
    Quit,
}

impl Screen {
    pub fn kind(&self) -> ScreenKind {
        match self {
            Screen::MainMenu => ScreenKind::MainMenu,
            Screen::ProfileSelect { .. } => ScreenKind::ProfileSelect,
            Screen::OpenSettings(_) => ScreenKind::OpenSettings,
            Screen::Opening(_) => ScreenKind::Opening,
            Screen::Validating(_) => ScreenKind::Validating,
            Screen::Fetching => ScreenKind::Fetching,
            Screen::AiKeywords(_) => ScreenKind::AiKeywords,
            Screen::AiLocations(_) => ScreenKind::AiLocations,
            Screen::AiCompanies(_) => ScreenKind::AiCompanies,
            Screen::AiDisplay { .. } => ScreenKind::AiDisplay,
            Screen::Quit => ScreenKind::Quit,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermEntry {
    pub buffer: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenField {
    Limit,
    Delay,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenSettingsForm {
    pub field: OpenField,
    pub buffer: String,
    pub available: usize,
    pub default_limit: usize,
    pub default_delay_ms: u64,
    pub limit: usize,
}

impl OpenSettingsForm {
    pub fn new(available: usize, configured_limit: usize, configured_delay_ms: u64) -> Self {
        let default_limit = clamp_limit(configured_limit, available);
        Self {
            field: OpenField::Limit,
            buffer: String::new(),
            available,
            default_limit,
            default_delay_ms: clamp_delay_ms(configured_delay_ms),
            limit: default_limit,
        }
    }

    pub fn push_digit(&mut self, ch: char) {
        if ch.is_ascii_digit() && self.buffer.len() < 9 {
            self.buffer.push(ch);
        }
    }

    pub fn backspace(&mut self) {
        self.buffer.pop();
    }

    /// Commits the active field; returns the plan once both are set.
    pub fn commit(&mut self) -> Option<TabPlan> {
        let entered = self.buffer.trim().parse::<u64>().ok();
        self.buffer.clear();
        match self.field {
            OpenField::Limit => {
                self.limit = entered
                    .map(|value| clamp_limit(value as usize, self.available))
                    .unwrap_or(self.default_limit);
                self.field = OpenField::Delay;
                None
            }
            OpenField::Delay => {
                let delay_ms = entered
                    .map(clamp_delay_ms)
                    .unwrap_or(self.default_delay_ms);
                Some(TabPlan {
                    limit: self.limit,
                    delay: Duration::from_millis(delay_ms),
                })
            }
        }
    }

    pub fn max_delay_ms() -> u64 {
        MAX_DELAY_MS
    }
}
