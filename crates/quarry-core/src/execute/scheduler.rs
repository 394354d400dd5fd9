//! Single-flight, per-session script scheduling.
//!
//! Every session runs at most one script at a time. Submissions made while a
//! script is running wait in a FIFO queue and start as soon as the previous
//! one finishes, whatever its outcome. Each busy session is driven by one
//! tokio task; the scripts themselves run on tokio's blocking pool.
//!
//! ```text
//! submit ──► Idle? ──yes──► Running ──► driver task
//!              │                           │
//!              no                          ├── build environment (once)
//!              │                           ├── spawn_blocking(script)
//!              ▼                           ├── reply + notify listeners
//!          FIFO queue ◄──── pop next ──────┘
//! ```

use std::collections::VecDeque;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use rustc_hash::FxHashMap;
use tokio::sync::oneshot;

use super::context::{AbortHandle, OutputSink, OutputStream, RunOutcome, SessionStatus, TaskListener};
use super::script::ScriptHost;
use crate::error::Error;
use crate::project::ClasspathBuilder;
use crate::resolve::ArtifactResolver;
use crate::session::{EnvironmentManager, IsolatedEnvironment};

/// Text written to a session's sink when it is restarted.
pub const RESTART_MARKER: &str = "[session restarted]";

/// Identifies the session a submission belongs to.
#[derive(Clone)]
pub struct SessionContext {
    /// Session key; submissions with equal keys share a session.
    pub key: String,

    /// Project whose classpath seeds the session's environment.
    pub project_dir: Option<PathBuf>,

    /// Also seed test-scoped project dependencies.
    pub include_test_scope: bool,

    /// Receives the output of every run in the session.
    pub sink: Arc<dyn OutputSink>,
}

impl SessionContext {
    pub fn new(key: impl Into<String>, sink: Arc<dyn OutputSink>) -> Self {
        Self {
            key: key.into(),
            project_dir: None,
            include_test_scope: false,
            sink,
        }
    }

    pub fn with_project(mut self, project_dir: impl Into<PathBuf>) -> Self {
        self.project_dir = Some(project_dir.into());
        self
    }

    pub fn with_test_scope(mut self, include: bool) -> Self {
        self.include_test_scope = include;
        self
    }
}

/// A script waiting to run.
pub struct RunRequest {
    pub script: String,
    pub title: String,
    pub listener: Option<Arc<dyn TaskListener>>,
}

impl RunRequest {
    pub fn new(script: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            title: title.into(),
            listener: None,
        }
    }

    /// Notify `listener` about this run in addition to the scheduler-wide ones.
    pub fn with_listener(mut self, listener: Arc<dyn TaskListener>) -> Self {
        self.listener = Some(listener);
        self
    }
}

/// Resolves to the outcome of a submitted run.
///
/// Dropping the handle does not cancel the run.
#[must_use = "the handle is the only way to observe the run's outcome"]
pub struct RunHandle {
    reply: oneshot::Receiver<RunOutcome>,
}

impl Future for RunHandle {
    type Output = RunOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<RunOutcome> {
        Pin::new(&mut self.reply)
            .poll(cx)
            .map(|reply| reply.unwrap_or(RunOutcome::Cancelled))
    }
}

struct PendingRun {
    request: RunRequest,
    reply: oneshot::Sender<RunOutcome>,
}

struct RunningTask {
    title: String,
    abort: AbortHandle,
}

#[derive(Default)]
struct SessionState {
    running: Option<RunningTask>,
    queue: VecDeque<PendingRun>,
    environment: Option<Arc<IsolatedEnvironment>>,
    disposed: bool,
}

/// One session: an environment, a run queue and an output sink.
pub struct ExecutionSession {
    key: String,
    project_dir: Option<PathBuf>,
    include_test_scope: bool,
    sink: Arc<dyn OutputSink>,
    state: Mutex<SessionState>,
}

impl ExecutionSession {
    fn new(context: &SessionContext) -> Self {
        Self {
            key: context.key.clone(),
            project_dir: context.project_dir.clone(),
            include_test_scope: context.include_test_scope,
            sink: Arc::clone(&context.sink),
            state: Mutex::new(SessionState::default()),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// The session's environment, once the first run has built it.
    pub fn environment(&self) -> Option<Arc<IsolatedEnvironment>> {
        self.state().environment.clone()
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Shared between the scheduler handle and its driver tasks.
struct SchedulerCore {
    runtime: tokio::runtime::Handle,
    manager: Arc<EnvironmentManager>,
    classpath: ClasspathBuilder,
    listeners: Mutex<Vec<Arc<dyn TaskListener>>>,
    sessions: Mutex<FxHashMap<String, Arc<ExecutionSession>>>,
}

/// Schedules script runs across sessions.
#[derive(Clone)]
pub struct ExecutionScheduler {
    core: Arc<SchedulerCore>,
}

impl ExecutionScheduler {
    /// Create a scheduler whose sessions resolve artifacts through `resolver`.
    ///
    /// Installs the process-wide grab redirect if it is not installed yet.
    pub fn new(resolver: Arc<ArtifactResolver>, runtime: tokio::runtime::Handle) -> Self {
        let manager = EnvironmentManager::new(Arc::clone(&resolver), runtime.clone());
        manager.install_grab_redirect();

        Self {
            core: Arc::new(SchedulerCore {
                runtime,
                manager,
                classpath: ClasspathBuilder::new(resolver),
                listeners: Mutex::new(Vec::new()),
                sessions: Mutex::new(FxHashMap::default()),
            }),
        }
    }

    pub fn manager(&self) -> &Arc<EnvironmentManager> {
        &self.core.manager
    }

    /// Register a listener notified about every run in every session.
    pub fn add_listener(&self, listener: Arc<dyn TaskListener>) {
        lock(&self.core.listeners).push(listener);
    }

    /// Submit a script for execution. Never blocks.
    ///
    /// Starts the run right away if the session is idle; otherwise queues it
    /// behind the runs already submitted.
    pub fn submit(&self, context: &SessionContext, request: RunRequest) -> RunHandle {
        let (reply, receiver) = oneshot::channel();
        let pending = PendingRun { request, reply };

        // The table stays locked until the session's state is, so a
        // concurrent restart either disposes the session before it is found
        // or sees this submission in it.
        let mut sessions = lock(&self.core.sessions);
        let session = self.core.live_session(&mut sessions, context);
        let mut state = session.state();
        drop(sessions);
        if state.running.is_some() {
            tracing::debug!(
                "Queued '{}' in session {} ({} waiting)",
                pending.request.title,
                session.key,
                state.queue.len() + 1
            );
            state.queue.push_back(pending);
        } else {
            let abort = AbortHandle::new();
            state.running = Some(RunningTask {
                title: pending.request.title.clone(),
                abort: abort.clone(),
            });
            drop(state);

            let core = Arc::clone(&self.core);
            let driven = Arc::clone(&session);
            self.core
                .runtime
                .spawn(async move { core.drive(driven, pending, abort).await });
        }

        RunHandle { reply: receiver }
    }

    /// Throw a session away.
    ///
    /// Interrupts the running script, completes every queued run with
    /// [`RunOutcome::Cancelled`] and disposes the session's environment. The
    /// next submission for `key` starts a fresh session. Unknown keys are
    /// ignored.
    pub fn restart(&self, key: &str) {
        let Some(session) = lock(&self.core.sessions).remove(key) else {
            return;
        };

        let (running, queued, environment) = {
            let mut state = session.state();
            state.disposed = true;
            (
                state.running.take(),
                std::mem::take(&mut state.queue),
                state.environment.take(),
            )
        };

        let was_running = running.is_some();
        if let Some(running) = running {
            tracing::debug!("Interrupting '{}' in session {}", running.title, key);
            running.abort.abort();
        }
        for pending in queued {
            let _ = pending.reply.send(RunOutcome::Cancelled);
        }
        if let Some(environment) = environment {
            self.core.manager.dispose(environment.id());
        }

        session.sink.flush();
        session
            .sink
            .write(OutputStream::Stdout, &format!("{RESTART_MARKER}\n"));
        if was_running {
            session.sink.status(SessionStatus::Idle);
        }

        tracing::info!("Restarted session {}", key);
    }

    /// Whether a script is currently running in session `key`.
    pub fn is_running(&self, key: &str) -> bool {
        self.session(key)
            .is_some_and(|session| session.state().running.is_some())
    }

    /// Number of runs waiting behind the current one in session `key`.
    pub fn queued(&self, key: &str) -> usize {
        self.session(key)
            .map_or(0, |session| session.state().queue.len())
    }

    /// Look up a live session.
    pub fn session(&self, key: &str) -> Option<Arc<ExecutionSession>> {
        lock(&self.core.sessions).get(key).cloned()
    }

    /// Restart every session.
    pub fn shutdown(&self) {
        let keys: Vec<String> = lock(&self.core.sessions).keys().cloned().collect();
        for key in keys {
            self.restart(&key);
        }
    }
}

impl SchedulerCore {
    /// Find the session for `context` in the locked table, creating it on
    /// first use. A disposed session left in the table is replaced.
    fn live_session(
        &self,
        sessions: &mut FxHashMap<String, Arc<ExecutionSession>>,
        context: &SessionContext,
    ) -> Arc<ExecutionSession> {
        if let Some(session) = sessions.get(&context.key) {
            if !session.state().disposed {
                return Arc::clone(session);
            }
        }

        tracing::info!("Created session {}", context.key);
        let session = Arc::new(ExecutionSession::new(context));
        sessions.insert(context.key.clone(), Arc::clone(&session));
        session
    }

    /// Run `first` and then everything queued behind it.
    async fn drive(&self, session: Arc<ExecutionSession>, first: PendingRun, abort: AbortHandle) {
        session.sink.status(SessionStatus::Running);

        let mut next = first;
        let mut abort = abort;
        loop {
            let PendingRun { request, reply } = next;
            let outcome = self.run(&session, &request, &abort).await;
            let _ = reply.send(outcome);

            let mut state = session.state();
            if state.disposed {
                // Restart already reset the session and its sink.
                return;
            }
            match state.queue.pop_front() {
                Some(pending) => {
                    abort = AbortHandle::new();
                    state.running = Some(RunningTask {
                        title: pending.request.title.clone(),
                        abort: abort.clone(),
                    });
                    next = pending;
                }
                None => {
                    state.running = None;
                    drop(state);
                    session.sink.status(SessionStatus::Idle);
                    return;
                }
            }
        }
    }

    /// Run one request to completion and notify listeners.
    async fn run(
        &self,
        session: &Arc<ExecutionSession>,
        request: &RunRequest,
        abort: &AbortHandle,
    ) -> RunOutcome {
        let environment = self.environment(session).await;
        if abort.is_aborted() {
            return RunOutcome::Cancelled;
        }

        let listeners = self.listeners_for(request);
        for listener in &listeners {
            listener.task_started(&request.title);
        }
        tracing::debug!("Running '{}' in session {}", request.title, session.key);

        let host = ScriptHost::new(
            Arc::clone(&self.manager),
            environment,
            Arc::clone(&session.sink),
            abort.clone(),
        );
        let script = request.script.clone();
        let result = tokio::task::spawn_blocking(move || host.run(&script)).await;

        let outcome = match result {
            _ if abort.is_aborted() => RunOutcome::Cancelled,
            Ok(Ok(value)) => RunOutcome::Completed { value },
            Ok(Err(Error::Aborted)) => RunOutcome::Cancelled,
            Ok(Err(Error::Execution(message))) => RunOutcome::Failed { message },
            Ok(Err(e)) => RunOutcome::Failed {
                message: e.to_string(),
            },
            Err(join) => RunOutcome::Failed {
                message: format!("script worker failed: {join}"),
            },
        };

        if let RunOutcome::Failed { message } = &outcome {
            tracing::debug!("'{}' failed in session {}: {}", request.title, session.key, message);
            session
                .sink
                .write(OutputStream::Stderr, &format!("{message}\n"));
        }

        for listener in &listeners {
            listener.task_ended(&request.title, &outcome);
        }
        outcome
    }

    /// The session's environment, building it on first use.
    ///
    /// A project that fails to parse or resolve still gets an environment;
    /// the problems are reported on the session's stderr channel.
    async fn environment(&self, session: &ExecutionSession) -> Arc<IsolatedEnvironment> {
        if let Some(environment) = session.environment() {
            return environment;
        }

        let seed = match &session.project_dir {
            None => Vec::new(),
            Some(dir) => match self
                .classpath
                .build_classpath(dir, session.include_test_scope)
                .await
            {
                Ok(classpath) => {
                    for (coordinate, error) in &classpath.unresolved {
                        session.sink.write(
                            OutputStream::Stderr,
                            &format!("warning: unresolved dependency {coordinate}: {error}\n"),
                        );
                    }
                    classpath.entries
                }
                Err(e) => {
                    tracing::warn!("Session {} starts without a project classpath: {}", session.key, e);
                    session.sink.write(
                        OutputStream::Stderr,
                        &format!("warning: {e}; running without the project classpath\n"),
                    );
                    Vec::new()
                }
            },
        };

        let environment = self.manager.create_environment(seed);
        let mut state = session.state();
        if state.disposed {
            self.manager.dispose(environment.id());
        } else {
            state.environment = Some(Arc::clone(&environment));
        }
        environment
    }

    fn listeners_for(&self, request: &RunRequest) -> Vec<Arc<dyn TaskListener>> {
        let mut listeners = lock(&self.listeners).clone();
        listeners.extend(request.listener.clone());
        listeners
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
