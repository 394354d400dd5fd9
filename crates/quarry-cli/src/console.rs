//! Terminal output for script runs.

use std::io::{self, Write};

use quarry_core::{OutputSink, OutputStream, RunOutcome, SessionStatus, TaskListener};

use crate::colors;

/// Writes script output straight to the terminal.
pub struct ConsoleSink;

impl OutputSink for ConsoleSink {
    fn write(&self, stream: OutputStream, text: &str) {
        match stream {
            OutputStream::Stdout => {
                let mut out = io::stdout().lock();
                out.write_all(text.as_bytes()).ok();
                out.flush().ok();
            }
            OutputStream::Stderr => {
                eprint!("{}{}{}", colors::RED, text, colors::RESET);
            }
        }
    }

    fn status(&self, status: SessionStatus) {
        tracing::debug!("Session is {:?}", status);
    }

    fn flush(&self) {
        io::stdout().flush().ok();
        io::stderr().flush().ok();
    }
}

/// Prints a progress line as each script starts and ends.
pub struct ProgressListener;

impl TaskListener for ProgressListener {
    fn task_started(&self, title: &str) {
        eprintln!(
            "{}▶ Running{} {}{}{}",
            colors::CYAN,
            colors::RESET,
            colors::BOLD,
            title,
            colors::RESET
        );
    }

    fn task_ended(&self, title: &str, outcome: &RunOutcome) {
        match outcome {
            RunOutcome::Completed { value } => {
                if let Some(value) = value {
                    println!("{}=> {}{}", colors::DIM, value, colors::RESET);
                }
                eprintln!("{}✓{} {}", colors::GREEN, colors::RESET, title);
            }
            RunOutcome::Failed { .. } => {
                eprintln!("{}✗{} {}", colors::RED, colors::RESET, title);
            }
            RunOutcome::Cancelled => {
                eprintln!("{}-{} {} cancelled", colors::YELLOW, colors::RESET, title);
            }
        }
    }
}
