//! Core engine for the quarry scripting shell.
//!
//! This crate provides:
//! - Artifact resolution against ordered repositories into a local cache
//! - Project descriptor parsing and classpath assembly
//! - Per-session isolated environments with a dynamic-grab redirect
//! - Single-flight script scheduling with queueing and restart

pub mod config;
pub mod error;
pub mod execute;
pub mod paths;
pub mod project;
pub mod resolve;
pub mod session;

pub use config::QuarryConfig;
pub use error::{Error, Result};
pub use execute::{
    AbortHandle, ExecutionScheduler, NullSink, OutputSink, OutputStream, RunHandle, RunOutcome,
    RunRequest, SessionContext, SessionStatus, TaskListener,
};
pub use paths::QuarryDirs;
pub use project::{
    Classpath, ClasspathBuilder, LaunchSpec, ProjectDescriptor, ProjectDescriptorParser,
    RuntimeProvider, ScopeFilter, SystemRuntimeProvider,
};
pub use resolve::{ArtifactResolver, DependencyCoordinate, RepositoryEndpoints, ResolverConfig};
pub use session::{EnvironmentManager, GrabTarget, IsolatedEnvironment, ParentBoundary};
