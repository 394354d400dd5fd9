//! Artifact resolution against remote repositories.
//!
//! Downloads artifacts into the local cache, probing each configured
//! repository in order until one of them serves the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::{FutureExt, StreamExt};
use reqwest::Url;
use tokio::io::AsyncWriteExt;

use super::coordinate::DependencyCoordinate;
use super::repository::RepositoryEndpoints;
use crate::error::{Error, Result};
use crate::paths::QuarryDirs;
use crate::session::IsolatedEnvironment;

/// Settings for an [`ArtifactResolver`].
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Root of the local artifact cache.
    pub cache_dir: PathBuf,

    /// Return an already cached file without touching the network.
    ///
    /// Off by default: every resolve re-downloads the artifact.
    pub reuse_cached: bool,

    /// Maximum number of downloads in flight for [`ArtifactResolver::resolve_all`].
    pub concurrency: usize,

    /// Per-request HTTP timeout.
    pub timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cache_dir: QuarryDirs::for_user().repo_dir,
            reuse_cached: false,
            concurrency: 4,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Resolves dependency coordinates to files in the local artifact cache.
pub struct ArtifactResolver {
    repositories: RepositoryEndpoints,
    config: ResolverConfig,
    client: reqwest::Client,
}

impl ArtifactResolver {
    /// Create a resolver over the given repositories.
    pub fn new(repositories: RepositoryEndpoints, config: ResolverConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("quarry/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            repositories,
            config,
            client,
        })
    }

    /// Repositories in lookup order.
    pub fn repositories(&self) -> &RepositoryEndpoints {
        &self.repositories
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Cache location for a coordinate (whether or not it exists yet).
    pub fn cache_path(&self, coordinate: &DependencyCoordinate) -> PathBuf {
        self.config.cache_dir.join(coordinate.relative_path())
    }

    /// Resolve a coordinate to a local file.
    ///
    /// Each repository is tried in order; a failure on one endpoint is logged
    /// and the next one is tried. Only exhaustion of every endpoint is an error.
    pub async fn resolve(&self, coordinate: &DependencyCoordinate) -> Result<PathBuf> {
        coordinate.validate()?;
        let dest = self.cache_path(coordinate);

        if self.config.reuse_cached && tokio::fs::try_exists(&dest).await.unwrap_or(false) {
            tracing::debug!("Using cached {} at {}", coordinate, dest.display());
            return Ok(dest);
        }

        let mut attempts = Vec::with_capacity(self.repositories.len());

        for base in self.repositories.iter() {
            let url = RepositoryEndpoints::artifact_url(base, coordinate)?;
            attempts.push(url.to_string());
            tracing::debug!("Fetching {} from {}", coordinate, url);

            let bytes = match self.fetch(&url).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!("Failed to fetch {}: {}", url, e);
                    continue;
                }
            };

            match store_atomically(&dest, &bytes).await {
                Ok(()) => {
                    tracing::info!("Resolved {} ({} bytes) from {}", coordinate, bytes.len(), base);
                    return Ok(dest);
                }
                Err(e) => {
                    tracing::warn!("Failed to store {} at {}: {}", coordinate, dest.display(), e);
                }
            }
        }

        Err(Error::Resolution {
            coordinate: coordinate.to_string(),
            attempts,
        })
    }

    /// Resolve many coordinates concurrently.
    ///
    /// Results are returned in input order, one per coordinate; failures do not
    /// stop the remaining downloads.
    pub async fn resolve_all(&self, coordinates: &[DependencyCoordinate]) -> Vec<Result<PathBuf>> {
        let pending: Vec<_> = coordinates.iter().map(|c| self.resolve(c).boxed()).collect();
        futures::stream::iter(pending)
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await
    }

    /// Resolve a coordinate and attach the file to an isolated environment.
    ///
    /// Fails with [`Error::Configuration`] before touching the network when no
    /// target environment is supplied.
    pub async fn bind(
        &self,
        coordinate: &DependencyCoordinate,
        target: Option<&IsolatedEnvironment>,
    ) -> Result<PathBuf> {
        let Some(env) = target else {
            return Err(Error::Configuration(format!(
                "cannot attach {coordinate}: no isolated environment configured"
            )));
        };

        let path = self.resolve(coordinate).await?;
        env.attach(coordinate.clone(), path.clone());
        Ok(path)
    }

    /// Fetch the bytes behind an artifact URL.
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>> {
        if url.scheme() == "file" {
            let path = url
                .to_file_path()
                .map_err(|()| Error::Configuration(format!("not a local path: {url}")))?;
            return Ok(tokio::fs::read(&path).await?);
        }

        let response = self.client.get(url.clone()).send().await?;
        let response = response.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

/// Write `bytes` to `dest` via a uniquely named temp file and a rename.
///
/// Concurrent writers of the same destination never observe a partial file,
/// and a failed write leaves nothing behind.
async fn store_atomically(dest: &Path, bytes: &[u8]) -> Result<()> {
    let parent = dest.parent().unwrap_or(Path::new("."));
    tokio::fs::create_dir_all(parent).await?;

    let file_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    let temp_path = parent.join(format!(".{}.{}.part", file_name, uuid::Uuid::new_v4()));

    let written = async {
        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&temp_path, dest).await
    }
    .await;

    if let Err(e) = written {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e.into());
    }

    Ok(())
}
