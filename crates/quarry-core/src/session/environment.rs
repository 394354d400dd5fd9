//! Isolated execution environments.
//!
//! An [`IsolatedEnvironment`] is the arena a session owns: the classpath it
//! was seeded with, every artifact grabbed while scripts ran, and the script
//! bindings that persist between runs. Dropping the last handle drops all of
//! it; nothing is shared with other sessions except the immutable
//! [`ParentBoundary`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use rhai::{Array, Dynamic, EvalAltResult, ImmutableString, Module, Scope, Shared};

use super::grab::{GrabTarget, dispatch_grab};
use super::manager::active_environment;
use crate::error::{Error, Result};
use crate::resolve::{ArtifactResolver, DependencyCoordinate};

/// Name under which the host prelude is visible to scripts (`quarry::grab(..)`).
pub const PRELUDE_NAMESPACE: &str = "quarry";

/// Return type of the prelude's native functions.
type NativeResult<T> = std::result::Result<T, Box<EvalAltResult>>;

static NEXT_ENVIRONMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier of an isolated environment within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnvironmentId(u64);

impl EnvironmentId {
    fn next() -> Self {
        Self(NEXT_ENVIRONMENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for EnvironmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "env-{}", self.0)
    }
}

/// The fixed parent every isolated environment delegates to.
///
/// Holds the host prelude module: product constants plus the functions
/// through which scripts reach their own environment. It is built once and
/// never mutated, so sharing it between sessions leaks nothing.
pub struct ParentBoundary {
    module: Shared<Module>,
}

impl ParentBoundary {
    /// Build the host prelude.
    pub fn host() -> Self {
        let mut module = Module::new();

        module.set_var("PRODUCT", ImmutableString::from("quarry"));
        module.set_var("VERSION", ImmutableString::from(env!("CARGO_PKG_VERSION")));

        // Requests target the shared environment; the grab redirect moves
        // them into the calling session's environment.
        module.set_native_fn("grab", |coordinate: ImmutableString| -> NativeResult<String> {
            let coordinate: DependencyCoordinate =
                coordinate.parse().map_err(|e: Error| e.to_string())?;
            let path = dispatch_grab(&coordinate, GrabTarget::Shared).map_err(|e| e.to_string())?;
            Ok(path.display().to_string())
        });

        module.set_native_fn("has_artifact", |coordinate: ImmutableString| -> NativeResult<bool> {
            let coordinate: DependencyCoordinate =
                coordinate.parse().map_err(|e: Error| e.to_string())?;
            Ok(active_environment().is_some_and(|env| env.artifact_path(&coordinate).is_some()))
        });

        module.set_native_fn("classpath", || -> NativeResult<Array> {
            let entries: Array = active_environment()
                .map(|env| env.classpath())
                .unwrap_or_default()
                .into_iter()
                .map(|p| Dynamic::from(p.display().to_string()))
                .collect();
            Ok(entries)
        });

        module.set_native_fn("session_id", || -> NativeResult<String> {
            Ok(active_environment()
                .map(|env| env.id().to_string())
                .unwrap_or_default())
        });

        module.build_index();

        Self {
            module: Shared::new(module),
        }
    }

    /// The prelude module, for registration into a script engine.
    pub fn module(&self) -> Shared<Module> {
        self.module.clone()
    }
}

impl Default for ParentBoundary {
    fn default() -> Self {
        Self::host()
    }
}

/// Disposable unit of artifact and binding visibility owned by one session.
pub struct IsolatedEnvironment {
    id: EnvironmentId,
    parent: Arc<ParentBoundary>,
    seed: Vec<PathBuf>,
    grabbed: Mutex<Vec<(DependencyCoordinate, PathBuf)>>,
    bindings: Mutex<Scope<'static>>,
    resolver: Arc<ArtifactResolver>,
    runtime: tokio::runtime::Handle,
}

impl IsolatedEnvironment {
    pub(crate) fn new(
        parent: Arc<ParentBoundary>,
        seed: Vec<PathBuf>,
        resolver: Arc<ArtifactResolver>,
        runtime: tokio::runtime::Handle,
    ) -> Self {
        Self {
            id: EnvironmentId::next(),
            parent,
            seed,
            grabbed: Mutex::new(Vec::new()),
            bindings: Mutex::new(Scope::new()),
            resolver,
            runtime,
        }
    }

    pub fn id(&self) -> EnvironmentId {
        self.id
    }

    pub fn parent(&self) -> &Arc<ParentBoundary> {
        &self.parent
    }

    /// Files visible to scripts: the seed classpath followed by grabbed artifacts.
    pub fn classpath(&self) -> Vec<PathBuf> {
        let grabbed = lock(&self.grabbed);
        self.seed
            .iter()
            .cloned()
            .chain(grabbed.iter().map(|(_, path)| path.clone()))
            .collect()
    }

    /// Artifacts attached by dynamic grabs, in attach order.
    pub fn grabbed(&self) -> Vec<DependencyCoordinate> {
        lock(&self.grabbed).iter().map(|(c, _)| c.clone()).collect()
    }

    /// Local file of an attached artifact.
    pub fn artifact_path(&self, coordinate: &DependencyCoordinate) -> Option<PathBuf> {
        lock(&self.grabbed)
            .iter()
            .find(|(c, _)| c == coordinate)
            .map(|(_, path)| path.clone())
    }

    /// Whether `path` is on this environment's classpath.
    pub fn contains(&self, path: &Path) -> bool {
        self.seed.iter().any(|p| p == path) || lock(&self.grabbed).iter().any(|(_, p)| p == path)
    }

    /// Attach a resolved artifact. Attaching the same coordinate again is a no-op.
    pub fn attach(&self, coordinate: DependencyCoordinate, path: PathBuf) {
        let mut grabbed = lock(&self.grabbed);
        if grabbed.iter().any(|(c, _)| *c == coordinate) {
            return;
        }
        tracing::debug!("Attached {} to {}", coordinate, self.id);
        grabbed.push((coordinate, path));
    }

    /// Resolve a coordinate and attach it to this environment.
    ///
    /// Blocks the calling thread on the download; must be called from a
    /// worker thread, never from inside an async task.
    pub fn grab(&self, coordinate: &DependencyCoordinate) -> Result<PathBuf> {
        if let Some(path) = self.artifact_path(coordinate) {
            return Ok(path);
        }
        self.runtime
            .block_on(self.resolver.bind(coordinate, Some(self)))
    }

    /// Names of the script bindings persisted in this environment.
    pub fn binding_names(&self) -> Vec<String> {
        lock(&self.bindings)
            .iter_raw()
            .map(|(name, _, _)| name.to_string())
            .collect()
    }

    pub fn has_binding(&self, name: &str) -> bool {
        lock(&self.bindings).contains(name)
    }

    /// Move the persisted bindings out for a run.
    pub(crate) fn take_bindings(&self) -> Scope<'static> {
        std::mem::take(&mut *lock(&self.bindings))
    }

    /// Put bindings back after a run.
    pub(crate) fn restore_bindings(&self, scope: Scope<'static>) {
        *lock(&self.bindings) = scope;
    }
}

impl fmt::Debug for IsolatedEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IsolatedEnvironment")
            .field("id", &self.id)
            .field("seed", &self.seed)
            .field("grabbed", &self.grabbed())
            .finish_non_exhaustive()
    }
}

impl Drop for IsolatedEnvironment {
    fn drop(&mut self) {
        tracing::debug!("Dropped isolated environment {}", self.id);
    }
}

/// Lock a mutex, recovering the data if a panicking thread poisoned it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
