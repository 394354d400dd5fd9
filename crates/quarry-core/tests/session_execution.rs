//! Integration tests for session scheduling, restart and dynamic grabs.
//!
//! Artifacts are served from a `file://` repository in a temp directory.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::Url;
use tempfile::TempDir;

use quarry_core::execute::RESTART_MARKER;
use quarry_core::{
    ArtifactResolver, DependencyCoordinate, ExecutionScheduler, OutputSink, OutputStream,
    RepositoryEndpoints, ResolverConfig, RunOutcome, RunRequest, SessionContext, SessionStatus,
    TaskListener,
};

// =============================================================================
// Test Helpers
// =============================================================================

/// Sink that records everything written to it.
#[derive(Default)]
struct RecordingSink {
    chunks: Mutex<Vec<(OutputStream, String)>>,
    statuses: Mutex<Vec<SessionStatus>>,
}

impl RecordingSink {
    fn text(&self, stream: OutputStream) -> String {
        self.chunks
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| *s == stream)
            .map(|(_, text)| text.as_str())
            .collect()
    }

    fn last_status(&self) -> Option<SessionStatus> {
        self.statuses.lock().unwrap().last().copied()
    }
}

impl OutputSink for RecordingSink {
    fn write(&self, stream: OutputStream, text: &str) {
        self.chunks.lock().unwrap().push((stream, text.to_string()));
    }

    fn status(&self, status: SessionStatus) {
        self.statuses.lock().unwrap().push(status);
    }
}

/// Listener that logs `start:<title>` / `end:<title>` events in order.
#[derive(Default)]
struct EventLog {
    events: Mutex<Vec<String>>,
}

impl EventLog {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl TaskListener for EventLog {
    fn task_started(&self, title: &str) {
        self.events.lock().unwrap().push(format!("start:{title}"));
    }

    fn task_ended(&self, title: &str, _outcome: &RunOutcome) {
        self.events.lock().unwrap().push(format!("end:{title}"));
    }
}

struct Fixture {
    repo: TempDir,
    _cache: TempDir,
    scheduler: ExecutionScheduler,
}

impl Fixture {
    fn new() -> Self {
        let repo = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();

        let base = Url::from_directory_path(repo.path()).unwrap().to_string();
        let endpoints = RepositoryEndpoints::with_default(&base).unwrap();
        let config = ResolverConfig {
            cache_dir: cache.path().to_path_buf(),
            ..ResolverConfig::default()
        };
        let resolver = Arc::new(ArtifactResolver::new(endpoints, config).unwrap());
        let scheduler = ExecutionScheduler::new(resolver, tokio::runtime::Handle::current());

        Self {
            repo,
            _cache: cache,
            scheduler,
        }
    }

    fn publish(&self, coordinate: &str) {
        let coordinate: DependencyCoordinate = coordinate.parse().unwrap();
        publish(self.repo.path(), &coordinate);
    }
}

fn publish(repo: &Path, coordinate: &DependencyCoordinate) {
    let path = repo.join(coordinate.relative_path());
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, coordinate.to_string()).unwrap();
}

fn value(outcome: RunOutcome) -> String {
    match outcome {
        RunOutcome::Completed { value: Some(value) } => value,
        other => panic!("expected a value, got {other}"),
    }
}

const SPIN: &str = "let n = 0; loop { n += 1; }";

// =============================================================================
// Scheduling
// =============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_queued_run_starts_after_previous_ends() {
    let fixture = Fixture::new();
    let log = Arc::new(EventLog::default());
    fixture.scheduler.add_listener(log.clone());

    let context = SessionContext::new("editor-1", Arc::new(RecordingSink::default()));
    let first = fixture.scheduler.submit(
        &context,
        RunRequest::new("let i = 0; while i < 100000 { i += 1; } i", "R1"),
    );
    let second = fixture.scheduler.submit(&context, RunRequest::new("2", "R2"));
    assert!(fixture.scheduler.is_running("editor-1"));

    assert_eq!(value(first.await), "100000");
    assert_eq!(value(second.await), "2");

    assert_eq!(log.events(), vec!["start:R1", "end:R1", "start:R2", "end:R2"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_runs_in_submission_order() {
    let fixture = Fixture::new();
    let sink = Arc::new(RecordingSink::default());
    let context = SessionContext::new("editor-1", sink.clone());

    let handles: Vec<_> = (0..5)
        .map(|i| {
            fixture
                .scheduler
                .submit(&context, RunRequest::new(format!("print({i});"), format!("R{i}")))
        })
        .collect();
    for handle in handles {
        assert!(handle.await.is_completed());
    }

    assert_eq!(sink.text(OutputStream::Stdout), "0\n1\n2\n3\n4\n");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_request_listener_is_notified() {
    let fixture = Fixture::new();
    let log = Arc::new(EventLog::default());
    let context = SessionContext::new("editor-1", Arc::new(RecordingSink::default()));

    let outcome = fixture
        .scheduler
        .submit(&context, RunRequest::new("1", "mine").with_listener(log.clone()))
        .await;

    assert!(outcome.is_completed());
    assert_eq!(log.events(), vec!["start:mine", "end:mine"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failure_returns_session_to_idle() {
    let fixture = Fixture::new();
    let sink = Arc::new(RecordingSink::default());
    let context = SessionContext::new("editor-1", sink.clone());

    let outcome = fixture
        .scheduler
        .submit(&context, RunRequest::new(r#"throw "boom";"#, "bad"))
        .await;

    match outcome {
        RunOutcome::Failed { message } => assert!(message.contains("boom")),
        other => panic!("expected failure, got {other}"),
    }
    assert!(sink.text(OutputStream::Stderr).contains("boom"));

    let outcome = fixture
        .scheduler
        .submit(&context, RunRequest::new("1 + 1", "good"))
        .await;
    assert_eq!(value(outcome), "2");

    // The driver reports Idle right after replying.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!fixture.scheduler.is_running("editor-1"));
    assert_eq!(sink.last_status(), Some(SessionStatus::Idle));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_sessions_run_independently() {
    let fixture = Fixture::new();
    let busy = SessionContext::new("busy", Arc::new(RecordingSink::default()));
    let other = SessionContext::new("other", Arc::new(RecordingSink::default()));

    let spinning = fixture.scheduler.submit(&busy, RunRequest::new(SPIN, "spin"));
    let outcome = fixture
        .scheduler
        .submit(&other, RunRequest::new("7", "quick"))
        .await;
    assert_eq!(value(outcome), "7");

    fixture.scheduler.restart("busy");
    assert_eq!(spinning.await, RunOutcome::Cancelled);
}

// =============================================================================
// Restart
// =============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_restart_discards_environment() {
    let fixture = Fixture::new();
    fixture.publish("org.example:marker:1.0");
    let sink = Arc::new(RecordingSink::default());
    let context = SessionContext::new("editor-1", sink.clone());

    let setup = fixture
        .scheduler
        .submit(
            &context,
            RunRequest::new(r#"let marker = 1; quarry::grab("org.example:marker:1.0");"#, "R0"),
        )
        .await;
    assert!(setup.is_completed());
    let check = fixture
        .scheduler
        .submit(
            &context,
            RunRequest::new(
                r#"is_def_var("marker") && quarry::has_artifact("org.example:marker:1.0")"#,
                "check",
            ),
        )
        .await;
    assert_eq!(value(check), "true");
    let old_env = fixture
        .scheduler
        .session("editor-1")
        .unwrap()
        .environment()
        .unwrap()
        .id();

    let running = fixture.scheduler.submit(&context, RunRequest::new(SPIN, "R1"));
    tokio::time::sleep(Duration::from_millis(100)).await;
    fixture.scheduler.restart("editor-1");
    assert_eq!(running.await, RunOutcome::Cancelled);
    assert!(sink.text(OutputStream::Stdout).contains(RESTART_MARKER));

    let binding = fixture
        .scheduler
        .submit(&context, RunRequest::new(r#"is_def_var("marker")"#, "R3"))
        .await;
    assert_eq!(value(binding), "false");

    let artifact = fixture
        .scheduler
        .submit(
            &context,
            RunRequest::new(r#"quarry::has_artifact("org.example:marker:1.0")"#, "R4"),
        )
        .await;
    assert_eq!(value(artifact), "false");

    let new_env = fixture
        .scheduler
        .session("editor-1")
        .unwrap()
        .environment()
        .unwrap()
        .id();
    assert_ne!(old_env, new_env);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_restart_cancels_queued_runs() {
    let fixture = Fixture::new();
    let log = Arc::new(EventLog::default());
    let context = SessionContext::new("editor-1", Arc::new(RecordingSink::default()));

    let running = fixture.scheduler.submit(&context, RunRequest::new(SPIN, "R1"));
    let queued = fixture
        .scheduler
        .submit(&context, RunRequest::new("1", "R2").with_listener(log.clone()));
    assert_eq!(fixture.scheduler.queued("editor-1"), 1);

    fixture.scheduler.restart("editor-1");

    assert_eq!(queued.await, RunOutcome::Cancelled);
    assert_eq!(running.await, RunOutcome::Cancelled);
    assert!(log.events().is_empty());
    assert!(!fixture.scheduler.is_running("editor-1"));
    assert_eq!(fixture.scheduler.queued("editor-1"), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_shutdown_restarts_every_session() {
    let fixture = Fixture::new();
    let a = SessionContext::new("a", Arc::new(RecordingSink::default()));
    let b = SessionContext::new("b", Arc::new(RecordingSink::default()));

    let first = fixture.scheduler.submit(&a, RunRequest::new(SPIN, "spin-a"));
    let second = fixture.scheduler.submit(&b, RunRequest::new(SPIN, "spin-b"));

    fixture.scheduler.shutdown();

    assert_eq!(first.await, RunOutcome::Cancelled);
    assert_eq!(second.await, RunOutcome::Cancelled);
    assert!(fixture.scheduler.session("a").is_none());
    assert!(fixture.scheduler.session("b").is_none());
}

// =============================================================================
// Dynamic grabs
// =============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_grab_lands_in_calling_session_only() {
    let fixture = Fixture::new();
    fixture.publish("org.example:alpha:1.0");
    let one = SessionContext::new("one", Arc::new(RecordingSink::default()));
    let two = SessionContext::new("two", Arc::new(RecordingSink::default()));

    let path = fixture
        .scheduler
        .submit(&one, RunRequest::new(r#"quarry::grab("org.example:alpha:1.0")"#, "grab"))
        .await;
    assert!(value(path).ends_with("alpha-1.0.jar"));

    let seen = fixture
        .scheduler
        .submit(&one, RunRequest::new("quarry::classpath().len()", "cp"))
        .await;
    assert_eq!(value(seen), "1");

    let other = fixture
        .scheduler
        .submit(
            &two,
            RunRequest::new(r#"quarry::has_artifact("org.example:alpha:1.0")"#, "check"),
        )
        .await;
    assert_eq!(value(other), "false");

    let env = fixture.scheduler.session("one").unwrap().environment().unwrap();
    assert_eq!(env.grabbed(), vec!["org.example:alpha:1.0".parse::<DependencyCoordinate>().unwrap()]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_grab_fails_the_run() {
    let fixture = Fixture::new();
    let context = SessionContext::new("editor-1", Arc::new(RecordingSink::default()));

    let outcome = fixture
        .scheduler
        .submit(&context, RunRequest::new(r#"quarry::grab("org.example:nowhere:9")"#, "grab"))
        .await;

    match outcome {
        RunOutcome::Failed { message } => assert!(message.contains("org.example:nowhere:9")),
        other => panic!("expected failure, got {other}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_project_classpath_seeds_session() {
    let fixture = Fixture::new();
    fixture.publish("org.example:lib:3.0");
    let project = TempDir::new().unwrap();
    std::fs::write(
        project.path().join("pom.xml"),
        r#"<project><dependencies>
  <dependency><groupId>org.example</groupId><artifactId>lib</artifactId><version>3.0</version></dependency>
  <dependency><groupId>org.example</groupId><artifactId>absent</artifactId><version>1</version></dependency>
</dependencies></project>"#,
    )
    .unwrap();

    let sink = Arc::new(RecordingSink::default());
    let context = SessionContext::new("editor-1", sink.clone()).with_project(project.path());

    let outcome = fixture
        .scheduler
        .submit(&context, RunRequest::new("quarry::classpath()[0]", "cp"))
        .await;

    assert!(value(outcome).ends_with("lib-3.0.jar"));
    assert!(sink.text(OutputStream::Stderr).contains("org.example:absent:1"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_versionless_dependency_keeps_the_rest_of_the_classpath() {
    let fixture = Fixture::new();
    fixture.publish("org.apache.commons:commons-lang3:3.12.0");
    let project = TempDir::new().unwrap();
    std::fs::write(
        project.path().join("pom.xml"),
        r#"<project><dependencies>
  <dependency><groupId>org.apache.commons</groupId><artifactId>commons-lang3</artifactId><version>3.12.0</version></dependency>
  <dependency><groupId>org.slf4j</groupId><artifactId>slf4j-api</artifactId></dependency>
</dependencies></project>"#,
    )
    .unwrap();

    let context =
        SessionContext::new("editor-1", Arc::new(RecordingSink::default())).with_project(project.path());
    let outcome = fixture
        .scheduler
        .submit(&context, RunRequest::new("quarry::classpath()", "cp"))
        .await;

    let classpath = value(outcome);
    assert!(classpath.contains("commons-lang3-3.12.0.jar"), "{classpath}");
    assert!(!classpath.contains("slf4j"), "{classpath}");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_test_scope_session_sees_test_dependencies() {
    let fixture = Fixture::new();
    fixture.publish("org.example:lib:3.0");
    fixture.publish("junit:junit:4.13.2");
    let project = TempDir::new().unwrap();
    std::fs::write(
        project.path().join("pom.xml"),
        r#"<project><dependencies>
  <dependency><groupId>org.example</groupId><artifactId>lib</artifactId><version>3.0</version></dependency>
  <dependency><groupId>junit</groupId><artifactId>junit</artifactId><version>4.13.2</version><scope>test</scope></dependency>
</dependencies></project>"#,
    )
    .unwrap();

    let plain = SessionContext::new("plain", Arc::new(RecordingSink::default())).with_project(project.path());
    let with_tests = SessionContext::new("tests", Arc::new(RecordingSink::default()))
        .with_project(project.path())
        .with_test_scope(true);

    let script = r#"quarry::has_artifact("junit:junit:4.13.2") || quarry::classpath().len() == 2"#;
    let plain = fixture.scheduler.submit(&plain, RunRequest::new(script, "plain"));
    let with_tests = fixture.scheduler.submit(&with_tests, RunRequest::new(script, "tests"));

    assert_eq!(value(plain.await), "false");
    assert_eq!(value(with_tests.await), "true");
}
