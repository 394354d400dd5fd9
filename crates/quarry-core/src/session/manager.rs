//! Ownership of isolated environments and the per-thread active context.
//!
//! The manager creates one [`IsolatedEnvironment`] per session and keeps a
//! registry of the ones still alive. A worker thread marks the environment
//! it is running a script in as *active* with [`EnvironmentManager::enter`];
//! the grab redirect reads that context to decide where a dynamically
//! grabbed artifact goes.

use std::cell::RefCell;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, Weak};

use rustc_hash::FxHashMap;

use super::environment::{EnvironmentId, IsolatedEnvironment, ParentBoundary};
use super::grab::{self, GrabTarget};
use crate::resolve::ArtifactResolver;

thread_local! {
    static ACTIVE: RefCell<Option<ActiveContext>> = const { RefCell::new(None) };
}

/// What a worker thread is currently running under.
#[derive(Clone)]
struct ActiveContext {
    manager: Arc<EnvironmentManager>,
    environment: Arc<IsolatedEnvironment>,
}

/// Creates and tracks isolated environments.
pub struct EnvironmentManager {
    parent: Arc<ParentBoundary>,
    resolver: Arc<ArtifactResolver>,
    runtime: tokio::runtime::Handle,
    environments: Mutex<FxHashMap<EnvironmentId, Weak<IsolatedEnvironment>>>,
}

impl EnvironmentManager {
    /// Create a manager whose environments resolve grabs through `resolver`
    /// and block on `runtime` while downloading.
    pub fn new(resolver: Arc<ArtifactResolver>, runtime: tokio::runtime::Handle) -> Arc<Self> {
        Arc::new(Self {
            parent: Arc::new(ParentBoundary::host()),
            resolver,
            runtime,
            environments: Mutex::new(FxHashMap::default()),
        })
    }

    pub fn resolver(&self) -> &Arc<ArtifactResolver> {
        &self.resolver
    }

    pub fn parent(&self) -> &Arc<ParentBoundary> {
        &self.parent
    }

    /// Create a fresh environment seeded with `classpath`.
    pub fn create_environment(&self, classpath: Vec<PathBuf>) -> Arc<IsolatedEnvironment> {
        let env = Arc::new(IsolatedEnvironment::new(
            self.parent.clone(),
            classpath,
            self.resolver.clone(),
            self.runtime.clone(),
        ));

        let mut environments = self.registry();
        environments.retain(|_, weak| weak.strong_count() > 0);
        environments.insert(env.id(), Arc::downgrade(&env));

        tracing::debug!("Created isolated environment {}", env.id());
        env
    }

    /// Forget an environment. Grabs can no longer be redirected into it,
    /// even from a thread that still has it active.
    pub fn dispose(&self, id: EnvironmentId) {
        if self.registry().remove(&id).is_some() {
            tracing::debug!("Disposed isolated environment {}", id);
        }
    }

    /// Whether `env` was created by this manager and is not disposed.
    pub fn owns(&self, env: &Arc<IsolatedEnvironment>) -> bool {
        self.registry()
            .get(&env.id())
            .and_then(Weak::upgrade)
            .is_some_and(|live| Arc::ptr_eq(&live, env))
    }

    /// Number of live environments.
    pub fn live_count(&self) -> usize {
        self.registry()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Pick the environment a grab request should really land in.
    ///
    /// Requests aimed at the shared environment are redirected when the
    /// calling thread is running inside one of this manager's environments.
    /// Explicit isolated targets are left alone.
    pub fn redirect_if_applicable(&self, requested: GrabTarget) -> GrabTarget {
        match requested {
            GrabTarget::Shared => match active_environment() {
                Some(env) if self.owns(&env) => {
                    tracing::debug!("Redirecting grab into {}", env.id());
                    GrabTarget::Isolated(env)
                }
                _ => GrabTarget::Shared,
            },
            isolated @ GrabTarget::Isolated(_) => isolated,
        }
    }

    /// Install the process-wide grab redirect.
    ///
    /// Returns `true` the first time it is called in the process and `false`
    /// afterwards; repeated calls have no further effect.
    pub fn install_grab_redirect(&self) -> bool {
        grab::install_redirect()
    }

    /// Mark `env` as the calling thread's active environment until the
    /// returned guard is dropped.
    pub fn enter(self: &Arc<Self>, env: Arc<IsolatedEnvironment>) -> ActiveEnvironmentGuard {
        let previous = ACTIVE.with(|active| {
            active.borrow_mut().replace(ActiveContext {
                manager: self.clone(),
                environment: env,
            })
        });
        ActiveEnvironmentGuard { previous }
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, FxHashMap<EnvironmentId, Weak<IsolatedEnvironment>>> {
        self.environments
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Restores the previous active context when dropped.
#[must_use = "the environment is only active while the guard is alive"]
pub struct ActiveEnvironmentGuard {
    previous: Option<ActiveContext>,
}

impl Drop for ActiveEnvironmentGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        ACTIVE.with(|active| *active.borrow_mut() = previous);
    }
}

/// The environment active on the calling thread, if any.
pub fn active_environment() -> Option<Arc<IsolatedEnvironment>> {
    ACTIVE.with(|active| active.borrow().as_ref().map(|ctx| ctx.environment.clone()))
}

/// The manager that activated the calling thread's environment, if any.
pub(crate) fn active_manager() -> Option<Arc<EnvironmentManager>> {
    ACTIVE.with(|active| active.borrow().as_ref().map(|ctx| ctx.manager.clone()))
}
