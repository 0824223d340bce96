use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use log::{info, warn};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use super::data_io::{Profile, load_profiles, read_urls};
use super::fetch::{FetchSettings, HttpJobFetcher};
use super::logging::{self, LogDestination};
use super::opener::SystemDesktop;
use super::session::{Collaborators, SessionState, TabDefaults};
use super::tui::draw_loop;
use super::types::Cli;
use super::validate::{HttpProbe, ProbeSettings, ValidationEngine};

const DEFAULT_PROFILES_DIR: &str = "profiles";

pub fn run() -> io::Result<()> {
    let cli = Cli::parse();
    let destination = if cli.dry_run {
        LogDestination::FileAndTerminal(cli.log_file.clone())
    } else {
        LogDestination::File(cli.log_file.clone())
    };
    logging::initialize(destination, logging::level_for(cli.verbose));

    let cwd = std::env::current_dir()?;
    let profiles_dir = cli
        .profiles_dir
        .clone()
        .unwrap_or_else(|| cwd.join(DEFAULT_PROFILES_DIR));
    let profiles = load_profiles(&profiles_dir);
    info!(
        "loaded {} profiles from {}",
        profiles.len(),
        profiles_dir.display()
    );

    let mut profile_idx = 0;
    if let Some(file) = &cli.file {
        let path = absolute_from(&cwd, file);
        if path.exists() {
            let list = read_urls(&path);
            println!("Loaded {} URLs from {}", list.urls.len(), path.display());
            if cli.dry_run {
                println!("Dry run complete.");
                return Ok(());
            }
            if let Some(idx) = profile_index_for(&profiles, &path) {
                profile_idx = idx;
            }
        } else {
            warn!("job list {} does not exist", path.display());
        }
    } else if cli.dry_run {
        print_profile_summary(&profiles, &profiles_dir);
        return Ok(());
    }

    if profiles.is_empty() {
        println!("No profiles found in {}", profiles_dir.display());
        println!("Create {}/<name>/jobs.txt to get started", profiles_dir.display());
        return Ok(());
    }

    let defaults = TabDefaults {
        limit: cli.tab_limit,
        delay_ms: cli.delay_ms,
    };
    let Some(mut state) = SessionState::new(profiles, profile_idx, defaults) else {
        return Ok(());
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("jobflare-worker")
        .enable_all()
        .build()?;

    let mut probe_settings = ProbeSettings {
        timeout: Duration::from_secs(cli.timeout_secs.max(1)),
        ..ProbeSettings::default()
    };
    if let Some(agent) = cli.user_agent.clone() {
        probe_settings.user_agent = agent;
    }
    let probe = HttpProbe::new(&probe_settings).map_err(io::Error::other)?;
    let mut engine = ValidationEngine::new(runtime.handle().clone(), Arc::new(probe));

    let fetch_settings = FetchSettings {
        timeout: Duration::from_secs(cli.fetch_timeout_secs.max(1)),
        ..FetchSettings::default()
    };
    let fetcher =
        HttpJobFetcher::new(runtime.handle().clone(), fetch_settings).map_err(io::Error::other)?;
    let desktop = SystemDesktop::new(Some(cli.browser.clone()));

    let tui_result = {
        let mut services = Collaborators {
            engine: &mut engine,
            desktop: &desktop,
            fetcher: &fetcher,
        };
        run_tui(&mut state, &mut services)
    };

    engine.shutdown();
    runtime.shutdown_timeout(Duration::from_secs(1));
    info!("session ended");
    println!("Bye.");

    tui_result
}

fn run_tui(state: &mut SessionState, services: &mut Collaborators<'_>) -> io::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let tui_result = draw_loop(&mut terminal, state, services);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    tui_result
}

fn absolute_from(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

pub fn profile_index_for(profiles: &[Profile], path: &Path) -> Option<usize> {
    let wanted = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    profiles.iter().position(|profile| {
        profile
            .jobs_file
            .canonicalize()
            .unwrap_or_else(|_| profile.jobs_file.clone())
            == wanted
    })
}

fn print_profile_summary(profiles: &[Profile], profiles_dir: &Path) {
    if profiles.is_empty() {
        println!("No profiles found in {}", profiles_dir.display());
        return;
    }
    println!("Profiles in {}:", profiles_dir.display());
    for profile in profiles {
        let list = read_urls(&profile.jobs_file);
        println!(
            "  {:<24} {:>5} URLs  {:>4} skipped  search specs: {}",
            profile.name,
            list.urls.len(),
            list.skipped,
            if profile.has_search_specs() { "yes" } else { "no" }
        );
    }
    println!("Dry run complete.");
}
