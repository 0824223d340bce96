use std::io::{self, Write};
use std::process::{Command, Stdio};
use std::time::Duration;

use log::{debug, info};
use thiserror::Error;

pub const DEFAULT_TAB_LIMIT: usize = 10;
pub const DEFAULT_DELAY_MS: u64 = 150;
pub const MAX_DELAY_MS: u64 = 5000;

#[derive(Debug, Error)]
pub enum OpenError {
    #[error("empty URL")]
    EmptyUrl,
    #[error("failed to launch {command}: {source}")]
    Spawn { command: String, source: io::Error },
    #[error("{command} exited with {status}")]
    Status { command: String, status: String },
    #[error("no clipboard tool available")]
    NoClipboard,
}

pub trait Desktop {
    /// Best effort; failures are ignored by callers.
    fn ensure_browser(&self);
    fn open_url(&self, url: &str) -> Result<(), OpenError>;
    fn copy_text(&self, text: &str) -> Result<(), OpenError>;
}

#[derive(Debug, Clone, Default)]
pub struct SystemDesktop {
    browser: Option<String>,
}

impl SystemDesktop {
    pub fn new(browser: Option<String>) -> Self {
        Self {
            browser: browser.filter(|name| !name.trim().is_empty()),
        }
    }
}

impl Desktop for SystemDesktop {
    fn ensure_browser(&self) {
        if !cfg!(target_os = "macos") {
            return;
        }
        if let Some(app) = &self.browser {
            let mut cmd = Command::new("open");
            cmd.args(["-a", app.as_str()]);
            if let Err(err) = run_quiet(cmd, "open -a") {
                debug!("could not start {app}: {err}");
            }
        }
    }

    fn open_url(&self, url: &str) -> Result<(), OpenError> {
        if url.trim().is_empty() {
            return Err(OpenError::EmptyUrl);
        }

        #[cfg(target_os = "macos")]
        let (command, label) = {
            let mut cmd = Command::new("open");
            if let Some(app) = &self.browser {
                cmd.args(["-a", app.as_str()]);
            }
            cmd.arg(url);
            (cmd, "open")
        };

        #[cfg(target_os = "windows")]
        let (command, label) = {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", "start", "", url]);
            (cmd, "cmd /C start")
        };

        #[cfg(all(not(target_os = "macos"), not(target_os = "windows")))]
        let (command, label) = {
            let mut cmd = Command::new("xdg-open");
            cmd.arg(url);
            (cmd, "xdg-open")
        };

        run_quiet(command, label)
    }

    fn copy_text(&self, text: &str) -> Result<(), OpenError> {
        let candidates: Vec<(&str, Vec<&str>)> = if cfg!(target_os = "macos") {
            vec![("pbcopy", vec![])]
        } else if cfg!(target_os = "windows") {
            vec![("clip", vec![])]
        } else {
            vec![("wl-copy", vec![]), ("xclip", vec!["-selection", "clipboard"])]
        };

        let mut last_error = OpenError::NoClipboard;
        for (program, args) in candidates {
            match pipe_to(program, &args, text) {
                Ok(()) => return Ok(()),
                Err(err) => {
                    debug!("clipboard via {program} failed: {err}");
                    last_error = err;
                }
            }
        }
        Err(last_error)
    }
}

fn run_quiet(mut command: Command, label: &str) -> Result<(), OpenError> {
    let status = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|source| OpenError::Spawn {
            command: label.to_string(),
            source,
        })?;
    if status.success() {
        Ok(())
    } else {
        Err(OpenError::Status {
            command: label.to_string(),
            status: status.to_string(),
        })
    }
}

fn pipe_to(program: &str, args: &[&str], text: &str) -> Result<(), OpenError> {
    let spawn_err = |source| OpenError::Spawn {
        command: program.to_string(),
        source,
    };
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(spawn_err)?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(text.as_bytes()).map_err(spawn_err)?;
    }
    let status = child.wait().map_err(spawn_err)?;
    if status.success() {
        Ok(())
    } else {
        Err(OpenError::Status {
            command: program.to_string(),
            status: status.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TabPlan {
    pub limit: usize,
    pub delay: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenSummary {
    pub requested: usize,
    pub opened: usize,
}

impl OpenSummary {
    pub fn message(&self) -> String {
        if self.opened == self.requested {
            format!("Opened {} tabs", self.opened)
        } else {
            format!("Opened {} of {} tabs", self.opened, self.requested)
        }
    }
}

pub fn clamp_limit(requested: usize, available: usize) -> usize {
    requested.clamp(1, available.max(1))
}

pub fn clamp_delay_ms(requested: u64) -> u64 {
    requested.min(MAX_DELAY_MS)
}

/// Opens `urls` in order, pausing `delay` between items. Not cancellable.
pub fn open_tabs(
    desktop: &dyn Desktop,
    urls: &[String],
    delay: Duration,
    mut on_progress: impl FnMut(usize, usize),
) -> OpenSummary {
    desktop.ensure_browser();

    let mut summary = OpenSummary {
        requested: urls.len(),
        opened: 0,
    };
    for (idx, url) in urls.iter().enumerate() {
        match desktop.open_url(url) {
            Ok(()) => summary.opened += 1,
            Err(err) => debug!("open failed for {url}: {err}"),
        }
        on_progress(idx + 1, urls.len());
        if !delay.is_zero() && idx + 1 < urls.len() {
            std::thread::sleep(delay);
        }
    }

    info!("opened {} of {} tabs", summary.opened, summary.requested);
    summary
}
