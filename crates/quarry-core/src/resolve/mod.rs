//! Dependency coordinates and artifact resolution.
//!
//! - `coordinate` - the `group:artifact:version` triple and its repository layout
//! - `repository` - ordered repository endpoints (central first)
//! - `resolver` - downloads artifacts into the local cache

mod coordinate;
mod repository;
mod resolver;

pub use coordinate::{DEFAULT_EXTENSION, DependencyCoordinate};
pub use repository::{CENTRAL_REPOSITORY, RepositoryEndpoints};
pub use resolver::{ArtifactResolver, ResolverConfig};
