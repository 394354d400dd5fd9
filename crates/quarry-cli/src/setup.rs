//! Resolver construction from the settings file and command-line flags.

use std::sync::Arc;

use quarry_core::{ArtifactResolver, QuarryConfig};

use crate::ResolveArgs;

/// Build a resolver from `~/.quarry/config.toml` with `args` applied on top.
pub fn resolver(args: &ResolveArgs) -> anyhow::Result<Arc<ArtifactResolver>> {
    let config = QuarryConfig::load()?;

    let endpoints = config.repositories_with(&args.repos)?;
    let mut resolver_config = config.resolver_config();
    if args.reuse_cached {
        resolver_config.reuse_cached = true;
    }
    if let Some(dir) = &args.cache_dir {
        resolver_config.cache_dir = dir.clone();
    }

    tracing::debug!(
        "Using {} repositories, cache at {}",
        endpoints.len(),
        resolver_config.cache_dir.display()
    );

    Ok(Arc::new(ArtifactResolver::new(endpoints, resolver_config)?))
}
