//! Run outcomes, output sinks and listeners for script execution.
//!
//! Provides the notification surface the scheduler reports through, plus
//! the cancellation flag checked while a script runs.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Handle for cancelling a running script.
///
/// `AbortHandle` is a thread-safe flag. It can be cloned and shared across
/// threads, and any clone can trigger the abort which will be visible to all
/// other clones. The script engine polls it between operations, so a script
/// stops at its next step without cooperating.
///
/// # Example
///
/// ```
/// use quarry_core::execute::AbortHandle;
///
/// let handle = AbortHandle::new();
/// let handle_clone = handle.clone();
///
/// assert!(!handle.is_aborted());
///
/// // Trigger abort from any clone
/// handle_clone.abort();
///
/// // All clones see the abort
/// assert!(handle.is_aborted());
/// ```
#[derive(Clone, Default)]
pub struct AbortHandle {
    /// Shared abort flag.
    aborted: Arc<AtomicBool>,
}

impl AbortHandle {
    /// Create a new abort handle.
    pub fn new() -> Self {
        Self {
            aborted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Check if abort has been requested.
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Relaxed)
    }

    /// Request abort of execution.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::Relaxed);
    }
}

impl fmt::Debug for AbortHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortHandle")
            .field("aborted", &self.is_aborted())
            .finish()
    }
}

/// Channel a chunk of script output belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Busy state of a session, as reported to its sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Running,
    Idle,
}

/// Receives the output of every run in a session.
pub trait OutputSink: Send + Sync {
    /// Append a chunk of text to one of the output channels.
    fn write(&self, stream: OutputStream, text: &str);

    /// Session switched between running and idle.
    fn status(&self, status: SessionStatus);

    /// Push out anything buffered.
    fn flush(&self) {}
}

/// How a run finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Script ran to the end. `value` is the rendered value of its last
    /// expression, if it produced one.
    Completed { value: Option<String> },

    /// Script raised an error.
    Failed { message: String },

    /// Run was interrupted or discarded by a restart.
    Cancelled,
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RunOutcome::Failed { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunOutcome::Cancelled)
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Completed { value: Some(value) } => write!(f, "completed: {value}"),
            RunOutcome::Completed { value: None } => write!(f, "completed"),
            RunOutcome::Failed { message } => write!(f, "failed: {message}"),
            RunOutcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Callback trait for run progress reporting.
///
/// Purely informational; nothing a listener does affects scheduling.
pub trait TaskListener: Send + Sync {
    /// Called when a run starts executing.
    fn task_started(&self, title: &str);

    /// Called when a run finishes, successfully or not.
    fn task_ended(&self, title: &str, outcome: &RunOutcome);
}

/// Sink that throws everything away.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn write(&self, _stream: OutputStream, _text: &str) {}

    fn status(&self, _status: SessionStatus) {}
}
