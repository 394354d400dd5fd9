//! Repository endpoint list.

use reqwest::Url;

use super::coordinate::DependencyCoordinate;
use crate::error::{Error, Result};

/// Base URL of the default central repository.
pub const CENTRAL_REPOSITORY: &str = "https://repo.maven.apache.org/maven2/";

/// Ordered, de-duplicated set of repository base URLs.
///
/// The central repository is always present and always tried first;
/// endpoints added later are only consulted when earlier ones fail.
#[derive(Debug, Clone)]
pub struct RepositoryEndpoints {
    endpoints: Vec<Url>,
}

impl RepositoryEndpoints {
    /// Endpoint list containing only the central repository.
    pub fn new() -> Self {
        Self {
            endpoints: normalize(CENTRAL_REPOSITORY).into_iter().collect(),
        }
    }

    /// Endpoint list whose first (default) endpoint is `default`.
    ///
    /// Used by deployments that mirror central, and by tests that serve
    /// artifacts from a local directory.
    pub fn with_default(default: &str) -> Result<Self> {
        Ok(Self {
            endpoints: vec![normalize(default)?],
        })
    }

    /// Append an endpoint. Returns `false` if it was already present.
    pub fn add(&mut self, base: &str) -> Result<bool> {
        let url = normalize(base)?;
        if self.endpoints.contains(&url) {
            tracing::debug!("Repository {} already configured", url);
            return Ok(false);
        }
        self.endpoints.push(url);
        Ok(true)
    }

    /// Endpoints in lookup order.
    pub fn iter(&self) -> impl Iterator<Item = &Url> {
        self.endpoints.iter()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Artifact URL of `coordinate` on the endpoint `base`.
    pub fn artifact_url(base: &Url, coordinate: &DependencyCoordinate) -> Result<Url> {
        base.join(&coordinate.repository_path())
            .map_err(|e| Error::Configuration(format!("bad artifact URL under {base}: {e}")))
    }
}

impl Default for RepositoryEndpoints {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a base URL, forcing a trailing slash so `Url::join` keeps the last segment.
fn normalize(base: &str) -> Result<Url> {
    let trimmed = base.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };

    let url = Url::parse(&with_slash)
        .map_err(|e| Error::Configuration(format!("invalid repository URL '{base}': {e}")))?;

    match url.scheme() {
        "http" | "https" | "file" => Ok(url),
        other => Err(Error::Configuration(format!(
            "unsupported repository scheme '{other}' in {base}"
        ))),
    }
}
