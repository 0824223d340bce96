use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use log::{debug, error, info};
use thiserror::Error;

use super::data_io::{Profile, write_validation_artifacts};

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("validation already running for profile '{0}'")]
    Busy(String),
    #[error("No URLs to validate")]
    Empty,
}

#[derive(Debug, Clone)]
pub struct ProbeSettings {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_PROBE_TIMEOUT,
            user_agent: concat!("jobflare/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Final status below 400; carries the URL after redirects.
    Live { final_url: String },
    Dead { reason: String },
}

#[async_trait]
pub trait LinkProbe: Send + Sync {
    async fn probe(&self, url: &str) -> ProbeOutcome;
}

#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(settings: &ProbeSettings) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(settings.timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl LinkProbe for HttpProbe {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        let head = match self.client.head(url).send().await {
            Ok(response) => response,
            Err(err) => {
                return ProbeOutcome::Dead {
                    reason: err.to_string(),
                };
            }
        };
        let response = if head.status().as_u16() >= 400 {
            match self.client.get(url).send().await {
                Ok(response) => response,
                Err(err) => {
                    return ProbeOutcome::Dead {
                        reason: err.to_string(),
                    };
                }
            }
        } else {
            head
        };

        let status = response.status().as_u16();
        if status < 400 {
            ProbeOutcome::Live {
                final_url: response.url().to_string(),
            }
        } else {
            ProbeOutcome::Dead {
                reason: format!("http {status}"),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Idle,
    Running,
    Done,
    Cancelled,
    Error,
}

impl RunStatus {
    fn as_u8(self) -> u8 {
        match self {
            RunStatus::Idle => 0,
            RunStatus::Running => 1,
            RunStatus::Done => 2,
            RunStatus::Cancelled => 3,
            RunStatus::Error => 4,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => RunStatus::Running,
            2 => RunStatus::Done,
            3 => RunStatus::Cancelled,
            4 => RunStatus::Error,
            _ => RunStatus::Idle,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RunStatus::Idle => "idle",
            RunStatus::Running => "running",
            RunStatus::Done => "done",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounters {
    pub total: usize,
    pub completed: usize,
    pub valid: usize,
    pub failed: usize,
}

/// Cooperative stop request shared between the session and the worker.
/// Checked before each probe, so an in-flight request always finishes.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
struct RunShared {
    counters: Mutex<RunCounters>,
    status: AtomicU8,
    error: Mutex<Option<String>>,
    finished_at: Mutex<Option<DateTime<Local>>>,
    cancel: CancelFlag,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RunShared {
    fn new(total: usize, cancel: CancelFlag) -> Self {
        Self {
            counters: Mutex::new(RunCounters {
                total,
                ..RunCounters::default()
            }),
            status: AtomicU8::new(RunStatus::Idle.as_u8()),
            error: Mutex::new(None),
            finished_at: Mutex::new(None),
            cancel,
        }
    }

    fn record(&self, valid: bool) {
        let mut counters = lock(&self.counters);
        counters.completed += 1;
        if valid {
            counters.valid += 1;
        } else {
            counters.failed += 1;
        }
    }

    fn set_status(&self, status: RunStatus) {
        if status != RunStatus::Running {
            *lock(&self.finished_at) = Some(Local::now());
        }
        self.status.store(status.as_u8(), Ordering::Release);
    }

    fn fail(&self, message: String) {
        *lock(&self.error) = Some(message);
        self.set_status(RunStatus::Error);
    }
}

#[derive(Debug, Clone)]
pub struct ValidationHandle {
    profile: String,
    shared: Arc<RunShared>,
}

impl ValidationHandle {
    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn counters(&self) -> RunCounters {
        *lock(&self.shared.counters)
    }

    pub fn status(&self) -> RunStatus {
        RunStatus::from_u8(self.shared.status.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        matches!(self.status(), RunStatus::Idle | RunStatus::Running)
    }

    pub fn error(&self) -> Option<String> {
        lock(&self.shared.error).clone()
    }

    pub fn finished_at(&self) -> Option<DateTime<Local>> {
        *lock(&self.shared.finished_at)
    }

    /// Idempotent; takes effect before the next URL is probed.
    pub fn cancel(&self) {
        self.shared.cancel.cancel();
    }
}

pub struct ValidationEngine {
    runtime: tokio::runtime::Handle,
    probe: Arc<dyn LinkProbe>,
    active: Option<ValidationHandle>,
}

impl ValidationEngine {
    pub fn new(runtime: tokio::runtime::Handle, probe: Arc<dyn LinkProbe>) -> Self {
        Self {
            runtime,
            probe,
            active: None,
        }
    }

    pub fn start(&mut self, profile: &Profile) -> Result<ValidationHandle, ValidationError> {
        self.start_with_cancel(profile, CancelFlag::new())
    }

    pub fn start_with_cancel(
        &mut self,
        profile: &Profile,
        cancel: CancelFlag,
    ) -> Result<ValidationHandle, ValidationError> {
        if let Some(active) = self.active.as_ref().filter(|handle| handle.is_running()) {
            return Err(ValidationError::Busy(active.profile.clone()));
        }
        if profile.urls.is_empty() {
            return Err(ValidationError::Empty);
        }

        let urls = profile.urls.clone();
        let shared = Arc::new(RunShared::new(urls.len(), cancel));
        shared.set_status(RunStatus::Running);
        let handle = ValidationHandle {
            profile: profile.name.clone(),
            shared: shared.clone(),
        };

        info!(
            "validation started for profile '{}' ({} URLs)",
            profile.name,
            urls.len()
        );
        let task = self.runtime.spawn(run_validation(
            urls,
            profile.dir.clone(),
            self.probe.clone(),
            shared.clone(),
        ));
        let name = profile.name.clone();
        self.runtime.spawn(async move {
            if let Err(err) = task.await {
                error!("validation task for profile '{name}' aborted: {err}");
                shared.fail(format!("validation task failed: {err}"));
            }
        });
        self.active = Some(handle.clone());
        Ok(handle)
    }

    pub fn active(&self) -> Option<&ValidationHandle> {
        self.active.as_ref()
    }

    pub fn shutdown(&self) {
        if let Some(active) = &self.active {
            active.cancel();
        }
    }
}

async fn run_validation(
    urls: Vec<String>,
    out_dir: PathBuf,
    probe: Arc<dyn LinkProbe>,
    shared: Arc<RunShared>,
) {
    let mut validated = Vec::new();
    let mut failed = Vec::new();

    for url in &urls {
        if shared.cancel.is_cancelled() {
            info!(
                "validation cancelled after {} of {} URLs",
                validated.len() + failed.len(),
                urls.len()
            );
            shared.set_status(RunStatus::Cancelled);
            return;
        }

        match probe.probe(url).await {
            ProbeOutcome::Live { final_url } => {
                validated.push(final_url);
                shared.record(true);
            }
            ProbeOutcome::Dead { reason } => {
                debug!("probe failed for {url}: {reason}");
                failed.push(url.clone());
                shared.record(false);
            }
        }
    }

    if let Err(err) = write_validation_artifacts(&out_dir, &validated, &failed) {
        let message = format!("failed to write results to {}: {err}", out_dir.display());
        error!("{message}");
        shared.fail(message);
        return;
    }

    info!(
        "validation finished: {} valid, {} failed",
        validated.len(),
        failed.len()
    );
    shared.set_status(RunStatus::Done);
}
