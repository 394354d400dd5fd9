//! Error types for quarry-core.

use thiserror::Error;

/// Result type for quarry-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in quarry-core.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed dependency coordinate string.
    #[error("invalid coordinate '{input}': {reason}")]
    Format { input: String, reason: String },

    /// No configured repository endpoint yielded the artifact.
    #[error("could not resolve {coordinate} from any repository ({} tried)", attempts.len())]
    Resolution {
        coordinate: String,
        /// URLs that were tried, in lookup order.
        attempts: Vec<String>,
    },

    /// Malformed or unreadable project descriptor.
    #[error("descriptor parse error: {0}")]
    Parse(String),

    /// Script raised an error while running.
    #[error("execution error: {0}")]
    Execution(String),

    /// An operation needed an isolated environment but none was configured.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Classpath assembly finished with coordinates that could not be resolved.
    #[error("unresolved dependencies: {}", .0.join(", "))]
    UnresolvedDependencies(Vec<String>),

    /// Run was cancelled before it finished.
    #[error("aborted")]
    Aborted,

    /// Invalid settings file.
    #[error("invalid config file: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Render the error with a short recovery hint for terminal output.
    pub fn with_hint(&self) -> String {
        let hint = match self {
            Error::Format { .. } => Some("coordinates are written as groupId:artifactId:version"),
            Error::Resolution { .. } => {
                Some("check the coordinate spelling or add a repository with --repo")
            }
            Error::Parse(_) => Some("make sure pom.xml is well-formed XML"),
            Error::Configuration(_) => {
                Some("dynamic grabs only work from a script running inside a session")
            }
            Error::UnresolvedDependencies(_) => {
                Some("run `quarry resolve <coordinate>` with --verbose to see each attempt")
            }
            Error::Config(_) => Some("see ~/.quarry/config.toml"),
            Error::Execution(_) | Error::Aborted | Error::Io(_) | Error::Http(_) => None,
        };

        match hint {
            Some(hint) => format!("{self}\n  hint: {hint}"),
            None => self.to_string(),
        }
    }
}
