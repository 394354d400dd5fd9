//! Classpath command implementation for Quarry CLI.

use std::path::Path;

use quarry_core::ClasspathBuilder;

use crate::ResolveArgs;
use crate::colors;
use crate::setup;

/// Print one resolved entry per line; report unresolved coordinates on stderr.
pub async fn execute(dir: &Path, include_test_scope: bool, args: &ResolveArgs) -> anyhow::Result<()> {
    let builder = ClasspathBuilder::new(setup::resolver(args)?);
    let classpath = builder.build_classpath(dir, include_test_scope).await?;

    for entry in &classpath.entries {
        println!("{}", entry.display());
    }

    for (coordinate, error) in &classpath.unresolved {
        eprintln!(
            "{}unresolved{} {}: {}",
            colors::YELLOW,
            colors::RESET,
            coordinate,
            error
        );
    }

    classpath.into_complete()?;
    Ok(())
}
