//! Run command implementation for Quarry CLI.
//!
//! Runs script files one after another in a single session, so bindings and
//! grabbed artifacts from earlier scripts are visible to later ones.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use quarry_core::{ExecutionScheduler, RunRequest, SessionContext};

use crate::ResolveArgs;
use crate::colors;
use crate::console::{ConsoleSink, ProgressListener};
use crate::setup;

const SESSION_KEY: &str = "cli";

/// Execute script files.
pub async fn execute(
    scripts: &[PathBuf],
    project: Option<&Path>,
    include_test_scope: bool,
    args: &ResolveArgs,
) -> anyhow::Result<()> {
    let start = Instant::now();

    let sources = scripts
        .iter()
        .map(|path| {
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to read script {}", path.display()))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let resolver = setup::resolver(args)?;
    let scheduler = ExecutionScheduler::new(resolver, tokio::runtime::Handle::current());
    scheduler.add_listener(Arc::new(ProgressListener));

    let mut context = SessionContext::new(SESSION_KEY, Arc::new(ConsoleSink));
    if let Some(project) = project {
        context = context.with_project(project).with_test_scope(include_test_scope);
    }

    let handles: Vec<_> = scripts
        .iter()
        .zip(sources)
        .map(|(path, source)| {
            scheduler.submit(&context, RunRequest::new(source, path.display().to_string()))
        })
        .collect();

    let mut failed = 0;
    for handle in handles {
        if !handle.await.is_completed() {
            failed += 1;
        }
    }

    let total_time = start.elapsed();
    if failed > 0 {
        anyhow::bail!("{} of {} scripts failed", failed, scripts.len());
    }

    eprintln!(
        "{}Completed{} {} scripts in {:.2}s",
        colors::GREEN,
        colors::RESET,
        scripts.len(),
        total_time.as_secs_f64()
    );
    Ok(())
}
