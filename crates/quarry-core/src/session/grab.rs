//! Process-wide redirect for dynamic grabs.
//!
//! Scripts ask for artifacts without naming an environment, which by default
//! means the shared one. Once the redirect is installed, such requests made
//! from a thread running inside a managed environment land in that
//! environment instead. The shared environment is never written to.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::environment::IsolatedEnvironment;
use super::manager::active_manager;
use crate::error::{Error, Result};
use crate::resolve::DependencyCoordinate;

static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Where a grab request should attach its artifact.
#[derive(Debug, Clone)]
pub enum GrabTarget {
    /// The process-wide environment shared by everything.
    Shared,
    /// A specific session's environment.
    Isolated(Arc<IsolatedEnvironment>),
}

/// Install the redirect. Returns `false` if it was already installed.
pub fn install_redirect() -> bool {
    let first = !INSTALLED.swap(true, Ordering::SeqCst);
    if first {
        tracing::debug!("Installed grab redirect");
    }
    first
}

/// Whether the redirect has been installed in this process.
pub fn redirect_installed() -> bool {
    INSTALLED.load(Ordering::SeqCst)
}

/// Route a grab request and perform it.
///
/// Requests that still target the shared environment after redirection are
/// refused with [`Error::Configuration`].
pub fn dispatch_grab(coordinate: &DependencyCoordinate, requested: GrabTarget) -> Result<PathBuf> {
    let target = match requested {
        GrabTarget::Shared if redirect_installed() => match active_manager() {
            Some(manager) => manager.redirect_if_applicable(GrabTarget::Shared),
            None => GrabTarget::Shared,
        },
        other => other,
    };

    match target {
        GrabTarget::Isolated(env) => env.grab(coordinate),
        GrabTarget::Shared => Err(Error::Configuration(format!(
            "cannot grab {coordinate}: the shared environment is read-only"
        ))),
    }
}
