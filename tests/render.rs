use std::fs;
use std::path::Path;
use std::sync::Arc;

use jobflare::app::data_io::load_profiles;
use jobflare::app::fetch::{FetchError, FetchSummary, JobFetcher};
use jobflare::app::opener::{Desktop, OpenError};
use jobflare::app::session::{Collaborators, SessionState, TabDefaults};
use jobflare::app::tui::render;
use jobflare::app::types::{Key, ScreenKind};
use jobflare::app::validate::{HttpProbe, ProbeSettings, ValidationEngine};
use ratatui::Terminal;
use ratatui::backend::TestBackend;
use tempfile::tempdir;

struct NoDesktop;

impl Desktop for NoDesktop {
    fn ensure_browser(&self) {}

    fn open_url(&self, _url: &str) -> Result<(), OpenError> {
        Ok(())
    }

    fn copy_text(&self, _text: &str) -> Result<(), OpenError> {
        Err(OpenError::NoClipboard)
    }
}

struct NoFetcher;

impl JobFetcher for NoFetcher {
    fn fetch(&self, _search_specs: &Path, _profile_dir: &Path) -> Result<FetchSummary, FetchError> {
        Err(FetchError::NoResults)
    }
}

fn screen_text(terminal: &Terminal<TestBackend>) -> String {
    let buffer = terminal.backend().buffer();
    let area = buffer.area;
    let mut text = String::new();
    for y in area.top()..area.bottom() {
        for x in area.left()..area.right() {
            text.push_str(buffer[(x, y)].symbol());
        }
        text.push('\n');
    }
    text
}

#[test]
fn long_prompt_renders_whole_lines_and_scrolls_to_the_end() {
    let dir = tempdir().expect("tempdir");
    let profile_dir = dir.path().join("solo");
    fs::create_dir_all(&profile_dir).expect("mkdir");
    fs::write(profile_dir.join("jobs.txt"), "https://a.com/1\n").expect("write jobs");

    let mut state = SessionState::new(
        load_profiles(dir.path()),
        0,
        TabDefaults {
            limit: 10,
            delay_ms: 0,
        },
    )
    .expect("profiles");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");
    let check = HttpProbe::new(&ProbeSettings::default()).expect("client");
    let mut engine = ValidationEngine::new(runtime.handle().clone(), Arc::new(check));
    let mut services = Collaborators {
        engine: &mut engine,
        desktop: &NoDesktop,
        fetcher: &NoFetcher,
    };

    for key in "gnnan".chars() {
        state.handle_key(Key::Char(key), &mut services);
    }
    assert_eq!(state.screen_kind(), ScreenKind::AiDisplay);
    assert_eq!(state.draft().selected_count(), 45);

    let mut terminal = Terminal::new(TestBackend::new(200, 50)).expect("terminal");
    terminal.draw(|f| render(f, &state)).expect("draw");
    let first = screen_text(&terminal);
    assert!(first.contains("Mandiant"));
    assert!(first.contains("Recorded"));
    assert!(!first.contains("Provide the tagged job URLs now, one per line."));

    for _ in 0..3 {
        state.handle_key(Key::PageDown, &mut services);
    }
    terminal.draw(|f| render(f, &state)).expect("draw");
    let scrolled = screen_text(&terminal);
    assert!(scrolled.contains("Provide the tagged job URLs now, one per line."));
    assert!(!scrolled.contains("# Job URL Search Request"));
}
