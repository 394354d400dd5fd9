//! User settings loaded from `~/.quarry/config.toml`.
//!
//! ```toml
//! mirror = "https://nexus.example.com/maven-central/"
//! repositories = ["https://maven.example.com/releases/"]
//! cache_dir = "/var/cache/quarry"
//! reuse_cached = true
//! concurrency = 8
//! timeout_secs = 30
//! ```
//!
//! Every key is optional. A missing file means defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::paths::QuarryDirs;
use crate::resolve::{CENTRAL_REPOSITORY, RepositoryEndpoints, ResolverConfig};

/// Settings file contents.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct QuarryConfig {
    /// Replaces the central repository as the first endpoint.
    pub mirror: Option<String>,

    /// Repositories consulted after the central one, in order.
    pub repositories: Vec<String>,

    /// Overrides the local artifact cache location.
    pub cache_dir: Option<PathBuf>,

    /// Serve already cached artifacts without re-downloading.
    pub reuse_cached: bool,

    /// Maximum parallel downloads while assembling a classpath.
    pub concurrency: Option<usize>,

    /// Per-request HTTP timeout in seconds.
    pub timeout_secs: Option<u64>,
}

impl QuarryConfig {
    /// Load the current user's settings file, or defaults if it is absent.
    pub fn load() -> Result<Self> {
        Self::load_from(&QuarryDirs::for_user().config_file)
    }

    /// Load settings from `path`, or defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content).map_err(|e| match e {
            Error::Config(reason) => Error::Config(format!("{}: {}", path.display(), reason)),
            other => other,
        })
    }

    /// Parse settings from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.message().to_string()))
    }

    /// Repository endpoints: central (or its mirror) first, then the
    /// configured ones and then `extra`, skipping duplicates.
    pub fn repositories_with(&self, extra: &[String]) -> Result<RepositoryEndpoints> {
        let default = self.mirror.as_deref().unwrap_or(CENTRAL_REPOSITORY);
        let mut endpoints = RepositoryEndpoints::with_default(default)?;
        for url in self.repositories.iter().chain(extra) {
            if !endpoints.add(url)? {
                tracing::debug!("Ignoring duplicate repository {}", url);
            }
        }
        Ok(endpoints)
    }

    /// Resolver settings with these overrides applied to the defaults.
    pub fn resolver_config(&self) -> ResolverConfig {
        let defaults = ResolverConfig::default();
        ResolverConfig {
            cache_dir: self.cache_dir.clone().unwrap_or(defaults.cache_dir),
            reuse_cached: self.reuse_cached,
            concurrency: self.concurrency.unwrap_or(defaults.concurrency).max(1),
            timeout: self
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }
}
