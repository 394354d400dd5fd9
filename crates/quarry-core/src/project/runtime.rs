//! Java runtime lookup for external build-tool launches.
//!
//! The core never selects runtimes itself; it only consumes the path a
//! [`RuntimeProvider`] hands back.

use std::path::{Path, PathBuf};

/// Supplies the Java installation to use for a project.
pub trait RuntimeProvider: Send + Sync {
    /// Java home for the project in `project_dir`, if one is known.
    fn java_home(&self, project_dir: &Path) -> Option<PathBuf>;
}

/// Provider backed by the process environment.
///
/// Uses `JAVA_HOME` when it is set, otherwise derives the installation root
/// from the `java` binary found on `PATH`.
#[derive(Debug, Clone, Default)]
pub struct SystemRuntimeProvider {
    java_home: Option<PathBuf>,
}

impl SystemRuntimeProvider {
    /// Capture `JAVA_HOME` from the current environment.
    pub fn new() -> Self {
        Self {
            java_home: std::env::var_os("JAVA_HOME")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        }
    }

    /// Always answer with an explicit installation.
    pub fn with_java_home(java_home: impl Into<PathBuf>) -> Self {
        Self {
            java_home: Some(java_home.into()),
        }
    }

    /// Find `java` in PATH.
    fn find_java() -> Option<PathBuf> {
        which::which("java").ok()
    }
}

impl RuntimeProvider for SystemRuntimeProvider {
    fn java_home(&self, _project_dir: &Path) -> Option<PathBuf> {
        if let Some(home) = &self.java_home {
            return Some(home.clone());
        }

        let java = Self::find_java()?;
        let home = java_home_from_binary(&java);
        if home.is_none() {
            tracing::debug!("Could not derive a Java home from {}", java.display());
        }
        home
    }
}

/// Installation root for a `.../bin/java` binary, following symlinks.
fn java_home_from_binary(java: &Path) -> Option<PathBuf> {
    let real = java.canonicalize().unwrap_or_else(|_| java.to_path_buf());
    let bin = real.parent()?;
    if bin.file_name()? != std::ffi::OsStr::new("bin") {
        return None;
    }
    bin.parent().map(Path::to_path_buf)
}
