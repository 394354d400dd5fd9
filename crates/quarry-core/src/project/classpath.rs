//! Classpath assembly for a project.
//!
//! Parses the project descriptor and resolves every retained dependency to a
//! local file, in declaration order.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::descriptor::{ProjectDescriptorParser, ScopeFilter};
use super::runtime::RuntimeProvider;
use crate::error::{Error, Result};
use crate::resolve::{ArtifactResolver, DependencyCoordinate};

/// File name of the project descriptor inside a project directory.
pub const DESCRIPTOR_FILE: &str = "pom.xml";

/// Result of assembling a classpath.
#[derive(Debug, Default)]
pub struct Classpath {
    /// Resolved files in declaration order. A coordinate declared twice
    /// appears twice.
    pub entries: Vec<PathBuf>,

    /// Coordinates that no repository could provide, with the reason.
    pub unresolved: Vec<(DependencyCoordinate, Error)>,
}

impl Classpath {
    /// Whether every retained dependency was resolved.
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }

    /// Return the entries, or [`Error::UnresolvedDependencies`] naming every
    /// coordinate that failed.
    pub fn into_complete(self) -> Result<Vec<PathBuf>> {
        if self.unresolved.is_empty() {
            return Ok(self.entries);
        }
        Err(Error::UnresolvedDependencies(
            self.unresolved.iter().map(|(c, _)| c.to_string()).collect(),
        ))
    }

    /// Entries joined with the platform path separator.
    pub fn to_path_string(&self) -> Result<OsString> {
        std::env::join_paths(&self.entries)
            .map_err(|e| Error::Configuration(format!("classpath entry cannot be joined: {e}")))
    }
}

/// Everything an external build tool launch needs from the core.
#[derive(Debug)]
pub struct LaunchSpec {
    /// Assembled classpath.
    pub classpath: Classpath,

    /// Java installation supplied by the runtime provider, if any.
    pub java_home: Option<PathBuf>,
}

/// Builds execution classpaths from project descriptors.
#[derive(Clone)]
pub struct ClasspathBuilder {
    resolver: Arc<ArtifactResolver>,
}

impl ClasspathBuilder {
    pub fn new(resolver: Arc<ArtifactResolver>) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &Arc<ArtifactResolver> {
        &self.resolver
    }

    /// Assemble the classpath of the project in `project_dir`.
    ///
    /// A malformed descriptor fails the whole build with [`Error::Parse`];
    /// individual resolution failures are collected in
    /// [`Classpath::unresolved`] instead.
    pub async fn build_classpath(
        &self,
        project_dir: &Path,
        include_test_scope: bool,
    ) -> Result<Classpath> {
        let filter = if include_test_scope {
            ScopeFilter::RuntimeAndTest
        } else {
            ScopeFilter::Runtime
        };

        let descriptor_path = project_dir.join(DESCRIPTOR_FILE);
        let descriptor = ProjectDescriptorParser::with_filter(filter).parse(&descriptor_path)?;

        tracing::debug!(
            "Assembling classpath for {} ({} dependencies)",
            project_dir.display(),
            descriptor.dependencies.len()
        );

        let results = self.resolver.resolve_all(&descriptor.dependencies).await;

        let mut classpath = Classpath::default();
        for (coordinate, result) in descriptor.dependencies.into_iter().zip(results) {
            match result {
                Ok(path) => classpath.entries.push(path),
                Err(e) => {
                    tracing::warn!("Unresolved dependency {}: {}", coordinate, e);
                    classpath.unresolved.push((coordinate, e));
                }
            }
        }

        Ok(classpath)
    }

    /// Assemble the classpath and pair it with the project's Java home.
    pub async fn launch_spec(
        &self,
        project_dir: &Path,
        provider: &dyn RuntimeProvider,
    ) -> Result<LaunchSpec> {
        let classpath = self.build_classpath(project_dir, false).await?;
        Ok(LaunchSpec {
            classpath,
            java_home: provider.java_home(project_dir),
        })
    }
}
