//! Dependency coordinates.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Packaging extension used when a descriptor does not name one.
pub const DEFAULT_EXTENSION: &str = "jar";

/// Immutable `(group, artifact, version)` triple identifying a downloadable artifact.
///
/// The packaging extension only affects the artifact file name. It takes no
/// part in equality or in the canonical string form.
#[derive(Debug, Clone, Eq)]
pub struct DependencyCoordinate {
    group: String,
    artifact: String,
    version: String,
    extension: String,
}

impl DependencyCoordinate {
    /// Create a coordinate from its three parts.
    pub fn new(
        group: impl Into<String>,
        artifact: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            artifact: artifact.into(),
            version: version.into(),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    /// Use a different packaging extension (e.g. `pom`, `rhai`).
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn artifact(&self) -> &str {
        &self.artifact
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Check that every part can be used as a repository path segment.
    ///
    /// Parts must be non-empty and free of path separators and `..`, so the
    /// layout path never leaves the repository or cache root.
    pub fn validate(&self) -> Result<()> {
        let parts = [
            ("group", &self.group),
            ("artifact", &self.artifact),
            ("version", &self.version),
            ("extension", &self.extension),
        ];

        for (name, part) in parts {
            let reason = if part.trim().is_empty() {
                format!("{name} must not be empty")
            } else if part.contains(['/', '\\']) {
                format!("{name} must not contain path separators")
            } else if part.contains("..") || part.as_str() == "." {
                format!("{name} must not contain relative path segments")
            } else {
                continue;
            };
            return Err(Error::Format {
                input: self.to_string(),
                reason,
            });
        }

        Ok(())
    }

    /// Artifact file name: `<artifact>-<version>.<ext>`.
    pub fn file_name(&self) -> String {
        format!("{}-{}.{}", self.artifact, self.version, self.extension)
    }

    /// Path segments of the standard repository layout, file name last.
    ///
    /// `org.apache.commons:commons-lang3:3.12.0` becomes
    /// `org/apache/commons/commons-lang3/3.12.0/commons-lang3-3.12.0.jar`.
    pub fn layout_segments(&self) -> Vec<String> {
        let mut segments: Vec<String> = self.group.split('.').map(str::to_string).collect();
        segments.push(self.artifact.clone());
        segments.push(self.version.clone());
        segments.push(self.file_name());
        segments
    }

    /// Repository-relative path using `/` separators.
    pub fn repository_path(&self) -> String {
        self.layout_segments().join("/")
    }

    /// Repository-relative path as a platform path.
    pub fn relative_path(&self) -> PathBuf {
        self.layout_segments().iter().collect()
    }
}

impl PartialEq for DependencyCoordinate {
    fn eq(&self, other: &Self) -> bool {
        self.group == other.group && self.artifact == other.artifact && self.version == other.version
    }
}

impl std::hash::Hash for DependencyCoordinate {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.group.hash(state);
        self.artifact.hash(state);
        self.version.hash(state);
    }
}

impl fmt::Display for DependencyCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.artifact, self.version)
    }
}

impl FromStr for DependencyCoordinate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 3 {
            return Err(Error::Format {
                input: s.to_string(),
                reason: format!("expected 3 colon-separated parts, found {}", parts.len()),
            });
        }

        if parts.iter().any(|p| p.trim().is_empty()) {
            return Err(Error::Format {
                input: s.to_string(),
                reason: "group, artifact and version must not be empty".to_string(),
            });
        }

        let coordinate = Self::new(parts[0].trim(), parts[1].trim(), parts[2].trim());
        coordinate.validate()?;
        Ok(coordinate)
    }
}
