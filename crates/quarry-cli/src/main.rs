//! Quarry CLI - Scripting shell with on-demand artifact resolution.

mod classpath;
mod colors;
mod console;
mod resolve;
mod run;
mod setup;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "quarry")]
#[command(about = "Scripting shell with on-demand artifact resolution")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Flags shared by every command that resolves artifacts.
#[derive(Args, Clone, Default)]
pub struct ResolveArgs {
    /// Extra repository consulted after the configured ones (repeatable)
    #[arg(long = "repo", value_name = "URL")]
    pub repos: Vec<String>,

    /// Serve already cached artifacts without re-downloading
    #[arg(long)]
    pub reuse_cached: bool,

    /// Artifact cache directory (default: ~/.quarry/repo)
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run script files in one session
    Run {
        /// Script files, run in order
        #[arg(required = true)]
        scripts: Vec<PathBuf>,

        /// Project directory whose pom.xml seeds the session classpath
        #[arg(short, long)]
        project: Option<PathBuf>,

        /// Include test-scoped project dependencies
        #[arg(long, requires = "project")]
        test: bool,

        #[command(flatten)]
        resolve: ResolveArgs,
    },

    /// Print the classpath assembled from a project's pom.xml
    Classpath {
        /// Project directory
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Include test-scoped dependencies
        #[arg(long)]
        test: bool,

        #[command(flatten)]
        resolve: ResolveArgs,
    },

    /// Resolve one artifact into the local cache
    Resolve {
        /// Coordinate as groupId:artifactId:version
        coordinate: String,

        #[command(flatten)]
        resolve: ResolveArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Helper to format quarry-core errors with recovery hints
    let format_error = |err: anyhow::Error| -> anyhow::Error {
        if let Some(quarry_err) = err.downcast_ref::<quarry_core::Error>() {
            anyhow::anyhow!("{}", quarry_err.with_hint())
        } else {
            err
        }
    };

    match cli.command {
        Commands::Run {
            scripts,
            project,
            test,
            resolve,
        } => {
            run::execute(&scripts, project.as_deref(), test, &resolve)
                .await
                .map_err(format_error)?;
        }

        Commands::Classpath { dir, test, resolve } => {
            classpath::execute(&dir, test, &resolve)
                .await
                .map_err(format_error)?;
        }

        Commands::Resolve {
            coordinate,
            resolve,
        } => {
            resolve::execute(&coordinate, &resolve)
                .await
                .map_err(format_error)?;
        }
    }

    Ok(())
}
