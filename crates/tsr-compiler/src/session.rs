//! One run of the tool, from `start` to `end`
//!
//! A [`Session`] sequences the lifecycle events on the bus and is the error
//! boundary around the compiler: whatever escapes a compile, panics
//! included, is published as an `error` event before the run shuts down.
//!
//! Event order for every run:
//!
//! ```text
//! start, transform*, error?, diagnostics, cleanup, stop, end
//! ```

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::bus::{EventBus, EventKind};
use crate::diagnostic::format_all;
use crate::driver::{task_failure, CompilationResult, Compiler};
use crate::error::{CompileError, Result};

pub struct Session {
    bus: Arc<EventBus>,
    started: Instant,
    failed: bool,
    diagnostics_sent: bool,
}

impl Session {
    /// Begin a run, publishing `start` with the requested files
    pub fn start(bus: Arc<EventBus>, files: &[PathBuf]) -> Self {
        let files: Vec<String> = files.iter().map(|f| f.display().to_string()).collect();
        info!(files = files.len(), "session started");
        bus.publish(EventKind::Start, json!(files));
        Self {
            bus,
            started: Instant::now(),
            failed: false,
            diagnostics_sent: false,
        }
    }

    pub fn failed(&self) -> bool {
        self.failed
    }

    /// Run `compiler` behind the error boundary, then publish the
    /// diagnostics of the batch
    pub async fn run(&mut self, compiler: Compiler) -> Result<CompilationResult> {
        self.run_until(compiler, std::future::pending()).await
    }

    /// Like [`Session::run`], but aborts the compile and fails the run with
    /// a fatal error once `interrupt` completes
    pub async fn run_until<F>(&mut self, compiler: Compiler, interrupt: F) -> Result<CompilationResult>
    where
        F: Future<Output = ()>,
    {
        let bus = Arc::clone(&self.bus);
        let task = tokio::spawn(async move { compiler.process(&bus).await });
        let abort = task.abort_handle();

        let outcome = tokio::select! {
            biased;
            () = interrupt => {
                warn!("interrupted, abandoning the compile");
                abort.abort();
                Err(CompileError::Fatal("interrupted".into()))
            }
            joined = task => joined.unwrap_or_else(|e| Err(task_failure(e))),
        };

        match &outcome {
            Ok(result) => self.publish_diagnostics(format_all(result.diagnostics())),
            Err(e) => {
                self.report_error(e);
                self.publish_diagnostics(Vec::new());
            }
        }
        outcome
    }

    /// Publish `error` for a failure that ends the run
    pub fn report_error(&mut self, err: &CompileError) {
        error!(kind = err.kind(), "{}", err);
        self.failed = true;
        self.bus.publish(
            EventKind::Error,
            json!({ "kind": err.kind(), "message": err.to_string() }),
        );
    }

    /// Publish `cleanup`, `stop` and `end`. Returns whether the run succeeded.
    pub fn finish(mut self, cleanup: Value) -> bool {
        if !self.diagnostics_sent {
            self.publish_diagnostics(Vec::new());
        }
        let success = !self.failed;
        let elapsed = self.started.elapsed().as_millis() as u64;

        self.bus.publish(EventKind::Cleanup, cleanup);
        self.bus.publish(EventKind::Stop, Value::Null);
        self.bus.publish(
            EventKind::End,
            json!({ "success": success, "elapsedMs": elapsed }),
        );
        info!(success, elapsed_ms = elapsed, "session finished");
        success
    }

    fn publish_diagnostics(&mut self, lines: Vec<String>) {
        if self.diagnostics_sent {
            return;
        }
        self.diagnostics_sent = true;
        self.bus.publish(EventKind::Diagnostics, json!(lines));
    }
}
