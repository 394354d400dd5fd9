//! Script host for session runs.
//!
//! Builds a Rhai engine per run with the `quarry` prelude registered as a
//! static namespace, routes `print`/`debug` to the session's output sink and
//! evaluates the script against the bindings persisted in the session's
//! isolated environment.

use std::sync::Arc;

use rhai::{Dynamic, Engine, EvalAltResult};

use super::context::{AbortHandle, OutputSink, OutputStream};
use crate::error::{Error, Result};
use crate::session::{EnvironmentManager, IsolatedEnvironment, PRELUDE_NAMESPACE};

/// Runs scripts inside one isolated environment.
pub struct ScriptHost {
    manager: Arc<EnvironmentManager>,
    environment: Arc<IsolatedEnvironment>,
    sink: Arc<dyn OutputSink>,
    abort: AbortHandle,
}

impl ScriptHost {
    pub fn new(
        manager: Arc<EnvironmentManager>,
        environment: Arc<IsolatedEnvironment>,
        sink: Arc<dyn OutputSink>,
        abort: AbortHandle,
    ) -> Self {
        Self {
            manager,
            environment,
            sink,
            abort,
        }
    }

    /// Create the Rhai engine for one run.
    fn create_engine(&self) -> Engine {
        let mut engine = Engine::new();

        engine.set_max_expr_depths(64, 64);

        engine.register_static_module(PRELUDE_NAMESPACE, self.environment.parent().module());

        let sink = Arc::clone(&self.sink);
        let abort = self.abort.clone();
        engine.on_print(move |text| {
            if !abort.is_aborted() {
                sink.write(OutputStream::Stdout, &format!("{text}\n"));
            }
        });

        let sink = Arc::clone(&self.sink);
        let abort = self.abort.clone();
        engine.on_debug(move |text, _source, _pos| {
            if !abort.is_aborted() {
                sink.write(OutputStream::Stderr, &format!("{text}\n"));
            }
        });

        // Terminates the run at its next operation once aborted.
        let abort = self.abort.clone();
        engine.on_progress(move |_ops| abort.is_aborted().then_some(Dynamic::UNIT));

        engine
    }

    /// Run a script to completion on the calling thread.
    ///
    /// Blocks for as long as the script runs; call it from a worker thread.
    /// Returns the rendered value of the last expression, if any.
    pub fn run(&self, script: &str) -> Result<Option<String>> {
        let engine = self.create_engine();

        let ast = engine
            .compile(script)
            .map_err(|e| Error::Execution(format!("syntax error: {e}")))?;

        let _active = self.manager.enter(Arc::clone(&self.environment));

        let mut scope = self.environment.take_bindings();
        let result = engine.eval_ast_with_scope::<Dynamic>(&mut scope, &ast);
        self.environment.restore_bindings(scope);

        match result {
            Ok(value) if value.is_unit() => Ok(None),
            Ok(value) => Ok(Some(value.to_string())),
            Err(e) => Err(map_eval_error(*e)),
        }
    }
}

fn map_eval_error(error: EvalAltResult) -> Error {
    match error {
        EvalAltResult::ErrorTerminated(..) => Error::Aborted,
        other => Error::Execution(other.to_string()),
    }
}
