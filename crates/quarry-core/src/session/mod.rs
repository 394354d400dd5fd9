//! Per-session isolation of grabbed artifacts and script bindings.

mod environment;
mod grab;
mod manager;

pub use environment::{EnvironmentId, IsolatedEnvironment, PRELUDE_NAMESPACE, ParentBoundary};
pub use grab::{GrabTarget, dispatch_grab, install_redirect, redirect_installed};
pub use manager::{ActiveEnvironmentGuard, EnvironmentManager, active_environment};
