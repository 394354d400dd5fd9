//! Quarry directory management.
//!
//! Provides consistent directory locations shared by the CLI and the
//! engine components.

use std::path::{Path, PathBuf};

/// Name of the per-user product directory under the home directory.
pub const PRODUCT_DIR: &str = ".quarry";

/// Directory structure for quarry's per-user state.
///
/// ```text
/// ~/.quarry/
/// ├── config.toml   # Optional settings
/// └── repo/         # Local artifact cache (repository layout)
/// ```
#[derive(Debug, Clone)]
pub struct QuarryDirs {
    /// The `.quarry` directory itself.
    pub root: PathBuf,

    /// Local artifact cache mirroring the repository layout.
    pub repo_dir: PathBuf,

    /// Settings file (may not exist).
    pub config_file: PathBuf,
}

impl QuarryDirs {
    /// Locate the directories under the current user's home.
    ///
    /// Falls back to the working directory when no home directory is known.
    /// Nothing is created on disk.
    pub fn for_user() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::under(&home)
    }

    /// Locate the directories under an explicit base (e.g. a test home).
    pub fn under(base: &Path) -> Self {
        let root = base.join(PRODUCT_DIR);
        Self {
            repo_dir: root.join("repo"),
            config_file: root.join("config.toml"),
            root,
        }
    }
}
