//! Script execution for quarry sessions.
//!
//! # Architecture
//!
//! ```text
//! ExecutionScheduler
//!     │
//!     └── ExecutionSession (one per context key)
//!             │
//!             ├── IsolatedEnvironment (built lazily from the project classpath)
//!             │
//!             └── driver task
//!                     │
//!                     └── spawn_blocking → ScriptHost::run
//!                             │
//!                             ├── print/debug → OutputSink
//!                             └── quarry::grab → grab redirect → environment
//! ```
//!
//! # Module Structure
//!
//! - `context` - Run outcomes, output sinks, listeners and abort handles
//! - `script` - Rhai script host
//! - `scheduler` - Single-flight per-session scheduling and restart

mod context;
mod scheduler;
mod script;

pub use context::{
    AbortHandle, NullSink, OutputSink, OutputStream, RunOutcome, SessionStatus, TaskListener,
};
pub use scheduler::{
    ExecutionScheduler, ExecutionSession, RESTART_MARKER, RunHandle, RunRequest, SessionContext,
};
pub use script::ScriptHost;
