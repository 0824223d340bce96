use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jobflare::app::data_io::{Profile, REPORT_FILE, VALIDATED_FILE};
use jobflare::app::validate::{
    CancelFlag, HttpProbe, LinkProbe, ProbeOutcome, ProbeSettings, RunStatus, ValidationEngine,
    ValidationError, ValidationHandle,
};
use pretty_assertions::assert_eq;
use tempfile::tempdir;
use tokio::sync::Semaphore;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn profile_in(dir: &Path, urls: Vec<String>) -> Profile {
    Profile {
        name: "test".to_string(),
        dir: dir.to_path_buf(),
        jobs_file: dir.join("jobs.txt"),
        search_specs: None,
        urls,
    }
}

async fn wait_until_finished(handle: &ValidationHandle) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while handle.is_running() {
        assert!(Instant::now() < deadline, "validation did not finish");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn http_probe(timeout: Duration) -> Arc<dyn LinkProbe> {
    let settings = ProbeSettings {
        timeout,
        ..ProbeSettings::default()
    };
    Arc::new(HttpProbe::new(&settings).expect("client"))
}

/// Reports every URL live without touching the network.
struct EchoProbe {
    delay: Duration,
}

#[async_trait]
impl LinkProbe for EchoProbe {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        tokio::time::sleep(self.delay).await;
        if url.contains("dead") {
            ProbeOutcome::Dead {
                reason: "dead".to_string(),
            }
        } else {
            ProbeOutcome::Live {
                final_url: url.to_string(),
            }
        }
    }
}

/// Requests cancellation while probing the `after`-th URL.
struct CancellingProbe {
    flag: CancelFlag,
    after: usize,
    calls: AtomicUsize,
}

#[async_trait]
impl LinkProbe for CancellingProbe {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.after {
            self.flag.cancel();
        }
        ProbeOutcome::Live {
            final_url: url.to_string(),
        }
    }
}

/// Panics on URLs containing "boom", reports the rest live.
struct PanickingCheck;

#[async_trait]
impl LinkProbe for PanickingCheck {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        if url.contains("boom") {
            panic!("checker crashed on {url}");
        }
        ProbeOutcome::Live {
            final_url: url.to_string(),
        }
    }
}

/// Blocks each probe until the test hands out a permit.
struct GatedProbe {
    gate: Arc<Semaphore>,
}

#[async_trait]
impl LinkProbe for GatedProbe {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        if let Ok(permit) = self.gate.acquire().await {
            permit.forget();
        }
        ProbeOutcome::Live {
            final_url: url.to_string(),
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_url_is_reported_as_failed() {
    let server = MockServer::start().await;
    for route in ["/job/1", "/job/2"] {
        Mock::given(method("HEAD"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
    }
    Mock::given(method("HEAD"))
        .and(path("/job/3"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let dir = tempdir().expect("tempdir");
    let urls = (1..=3)
        .map(|n| format!("{}/job/{n}", server.uri()))
        .collect::<Vec<_>>();
    let profile = profile_in(dir.path(), urls.clone());

    let mut engine = ValidationEngine::new(
        tokio::runtime::Handle::current(),
        http_probe(Duration::from_millis(300)),
    );
    let handle = engine.start(&profile).expect("start");
    wait_until_finished(&handle).await;

    assert_eq!(handle.status(), RunStatus::Done);
    let counters = handle.counters();
    assert_eq!(
        (counters.total, counters.completed, counters.valid, counters.failed),
        (3, 3, 2, 1)
    );

    let validated = fs::read_to_string(dir.path().join(VALIDATED_FILE)).expect("validated");
    assert_eq!(validated.lines().count(), 2);
    let report = fs::read_to_string(dir.path().join(REPORT_FILE)).expect("report");
    assert_eq!(
        report,
        format!("Validated: 2\nFailed: 1\n\nFailed URLs:\n{}\n", urls[2])
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn head_rejection_falls_back_to_get() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/get-only"))
        .respond_with(ResponseTemplate::new(405))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/get-only"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let probe = http_probe(Duration::from_secs(2));
    let live = probe.probe(&format!("{}/get-only", server.uri())).await;
    assert_eq!(
        live,
        ProbeOutcome::Live {
            final_url: format!("{}/get-only", server.uri())
        }
    );
    let dead = probe.probe(&format!("{}/gone", server.uri())).await;
    assert!(matches!(dead, ProbeOutcome::Dead { .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn redirects_record_final_location() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("Location", format!("{}/new", server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dir = tempdir().expect("tempdir");
    let profile = profile_in(dir.path(), vec![format!("{}/old", server.uri())]);
    let mut engine = ValidationEngine::new(
        tokio::runtime::Handle::current(),
        http_probe(Duration::from_secs(2)),
    );
    let handle = engine.start(&profile).expect("start");
    wait_until_finished(&handle).await;

    let validated = fs::read_to_string(dir.path().join(VALIDATED_FILE)).expect("validated");
    assert_eq!(validated, format!("{}/new\n", server.uri()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelled_run_stops_and_writes_nothing() {
    let dir = tempdir().expect("tempdir");
    let urls = (0..6)
        .map(|n| format!("https://example.com/{n}"))
        .collect::<Vec<_>>();
    let profile = profile_in(dir.path(), urls);

    let flag = CancelFlag::new();
    let probe = Arc::new(CancellingProbe {
        flag: flag.clone(),
        after: 2,
        calls: AtomicUsize::new(0),
    });
    let mut engine = ValidationEngine::new(tokio::runtime::Handle::current(), probe);
    let handle = engine.start_with_cancel(&profile, flag).expect("start");
    wait_until_finished(&handle).await;

    assert_eq!(handle.status(), RunStatus::Cancelled);
    let counters = handle.counters();
    assert_eq!(counters.completed, 2);
    assert_eq!(counters.valid + counters.failed, counters.completed);
    assert!(!dir.path().join(VALIDATED_FILE).exists());
    assert!(!dir.path().join(REPORT_FILE).exists());
    assert!(handle.finished_at().is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn second_start_is_rejected_while_running() {
    let dir = tempdir().expect("tempdir");
    let profile = profile_in(
        dir.path(),
        vec!["https://a.com".to_string(), "https://b.com".to_string()],
    );
    let gate = Arc::new(Semaphore::new(0));
    let mut engine = ValidationEngine::new(
        tokio::runtime::Handle::current(),
        Arc::new(GatedProbe { gate: gate.clone() }),
    );

    let first = engine.start(&profile).expect("start");
    assert!(first.is_running());
    assert!(matches!(
        engine.start(&profile),
        Err(ValidationError::Busy(name)) if name == "test"
    ));

    gate.add_permits(2);
    wait_until_finished(&first).await;
    assert_eq!(first.status(), RunStatus::Done);

    gate.add_permits(2);
    let second = engine.start(&profile).expect("restart after finish");
    wait_until_finished(&second).await;
    assert_eq!(second.counters().valid, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn empty_profile_is_rejected() {
    let dir = tempdir().expect("tempdir");
    let profile = profile_in(dir.path(), Vec::new());
    let mut engine = ValidationEngine::new(
        tokio::runtime::Handle::current(),
        Arc::new(EchoProbe {
            delay: Duration::ZERO,
        }),
    );
    let err = engine.start(&profile).expect_err("empty");
    assert_eq!(err.to_string(), "No URLs to validate");
    assert!(engine.active().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn counters_stay_consistent_while_polled() {
    let dir = tempdir().expect("tempdir");
    let urls = (0..40)
        .map(|n| {
            if n % 3 == 0 {
                format!("https://dead.example.com/{n}")
            } else {
                format!("https://example.com/{n}")
            }
        })
        .collect::<Vec<_>>();
    let profile = profile_in(dir.path(), urls);
    let mut engine = ValidationEngine::new(
        tokio::runtime::Handle::current(),
        Arc::new(EchoProbe {
            delay: Duration::from_millis(2),
        }),
    );
    let handle = engine.start(&profile).expect("start");

    let mut last = handle.counters();
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let counters = handle.counters();
        assert_eq!(counters.valid + counters.failed, counters.completed);
        assert!(counters.completed <= counters.total);
        assert_eq!(counters.total, 40);
        assert!(counters.completed >= last.completed);
        assert!(counters.valid >= last.valid);
        assert!(counters.failed >= last.failed);
        last = counters;
        if !handle.is_running() {
            break;
        }
        assert!(Instant::now() < deadline, "validation did not finish");
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    assert_eq!(handle.status(), RunStatus::Done);
    let counters = handle.counters();
    assert_eq!((counters.valid, counters.failed), (26, 14));
    let validated = fs::read_to_string(dir.path().join(VALIDATED_FILE)).expect("validated");
    assert_eq!(validated.lines().count(), counters.valid);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn write_failure_sets_error_status() {
    let dir = tempdir().expect("tempdir");
    let missing = dir.path().join("does-not-exist");
    let profile = profile_in(&missing, vec!["https://a.com".to_string()]);
    let mut engine = ValidationEngine::new(
        tokio::runtime::Handle::current(),
        Arc::new(EchoProbe {
            delay: Duration::ZERO,
        }),
    );
    let handle = engine.start(&profile).expect("start");
    wait_until_finished(&handle).await;

    assert_eq!(handle.status(), RunStatus::Error);
    assert!(handle.error().is_some_and(|message| message.contains("failed to write")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn blocked_report_keeps_previous_validated_file() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join(VALIDATED_FILE), "https://old.example/prior\n").expect("seed");
    fs::create_dir(dir.path().join(REPORT_FILE)).expect("block report path");
    let profile = profile_in(dir.path(), vec!["https://a.com/new".to_string()]);
    let mut engine = ValidationEngine::new(
        tokio::runtime::Handle::current(),
        Arc::new(EchoProbe {
            delay: Duration::ZERO,
        }),
    );
    let handle = engine.start(&profile).expect("start");
    wait_until_finished(&handle).await;

    assert_eq!(handle.status(), RunStatus::Error);
    let validated = fs::read_to_string(dir.path().join(VALIDATED_FILE)).expect("validated");
    assert_eq!(validated, "https://old.example/prior\n");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn blocked_validated_file_restores_previous_report() {
    let dir = tempdir().expect("tempdir");
    let previous = "Validated: 1\nFailed: 0\n\nFailed URLs:\n";
    fs::write(dir.path().join(REPORT_FILE), previous).expect("seed");
    fs::create_dir(dir.path().join(VALIDATED_FILE)).expect("block validated path");
    let profile = profile_in(
        dir.path(),
        vec!["https://a.com/1".to_string(), "https://dead.com/2".to_string()],
    );
    let mut engine = ValidationEngine::new(
        tokio::runtime::Handle::current(),
        Arc::new(EchoProbe {
            delay: Duration::ZERO,
        }),
    );
    let handle = engine.start(&profile).expect("start");
    wait_until_finished(&handle).await;

    assert_eq!(handle.status(), RunStatus::Error);
    let report = fs::read_to_string(dir.path().join(REPORT_FILE)).expect("report");
    assert_eq!(report, previous);
    let leftovers = fs::read_dir(dir.path()).expect("list").count();
    assert_eq!(leftovers, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn crashed_run_ends_with_error_and_frees_engine() {
    let dir = tempdir().expect("tempdir");
    let mut engine =
        ValidationEngine::new(tokio::runtime::Handle::current(), Arc::new(PanickingCheck));

    let crashing = profile_in(
        dir.path(),
        vec!["https://a.com/1".to_string(), "https://boom.com/2".to_string()],
    );
    let handle = engine.start(&crashing).expect("start");
    wait_until_finished(&handle).await;

    assert_eq!(handle.status(), RunStatus::Error);
    assert!(
        handle
            .error()
            .is_some_and(|message| message.contains("validation task failed"))
    );
    assert!(handle.finished_at().is_some());
    assert!(!dir.path().join(VALIDATED_FILE).exists());

    let healthy = profile_in(dir.path(), vec!["https://a.com/1".to_string()]);
    let next = engine.start(&healthy).expect("engine accepts a new run");
    wait_until_finished(&next).await;
    assert_eq!(next.status(), RunStatus::Done);
}
