//! Resolve command implementation for Quarry CLI.

use quarry_core::DependencyCoordinate;

use crate::ResolveArgs;
use crate::setup;

/// Resolve a coordinate and print the cached file's path.
pub async fn execute(coordinate: &str, args: &ResolveArgs) -> anyhow::Result<()> {
    let coordinate: DependencyCoordinate = coordinate.parse()?;
    let resolver = setup::resolver(args)?;

    let path = resolver.resolve(&coordinate).await?;
    println!("{}", path.display());
    Ok(())
}
