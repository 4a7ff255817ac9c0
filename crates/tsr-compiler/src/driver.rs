//! The compiler: read, parse, rewrite and emit every file of a batch
//!
//! Files are processed concurrently, one task each. The batch fails on the
//! first failing file; the remaining tasks are cancelled and their results
//! discarded. On success, results are in input order.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::json;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::{EventBus, EventKind};
use crate::config::{CompilationConfig, TransformOptions};
use crate::diagnostic::{Category, Diagnostic};
use crate::error::{CompileError, Result};
use crate::pipeline::Pipeline;
use crate::rules::{default_pipeline, RuleOptions};

/// The rewritten output of one input file
#[derive(Debug, Clone, PartialEq)]
pub struct FileResult {
    pub file_name: String,
    pub file_path: PathBuf,
    pub output_text: String,
    pub diagnostics: Vec<Diagnostic>,
}

/// The output of a fully successful batch
#[derive(Debug, Clone)]
pub struct CompilationResult {
    pub config: CompilationConfig,
    /// One entry per input file, in input order
    pub file_results: Vec<FileResult>,
}

impl CompilationResult {
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.file_results.iter().flat_map(|file| file.diagnostics.iter())
    }
}

/// Runs the pipeline over every file of a [`CompilationConfig`]
pub struct Compiler {
    config: CompilationConfig,
    pipeline: Arc<Pipeline>,
}

impl Compiler {
    /// Create a compiler with the default rule set
    pub fn new(config: CompilationConfig) -> Self {
        let pipeline = default_pipeline(&RuleOptions::from(&config.options));
        Self::with_pipeline(config, pipeline)
    }

    /// Create a compiler with a custom pipeline
    ///
    /// The pipeline's rules are shared by every file of the run.
    pub fn with_pipeline(config: CompilationConfig, pipeline: Pipeline) -> Self {
        Self {
            config,
            pipeline: Arc::new(pipeline),
        }
    }

    /// Compile every file, publishing `transform` on the bus as the batch
    /// enters the pipeline
    pub async fn process(&self, bus: &EventBus) -> Result<CompilationResult> {
        self.config.validate()?;

        let files = &self.config.files;
        let names: Vec<String> = files.iter().map(|path| file_name(path)).collect();
        info!(files = files.len(), rules = ?self.pipeline.rule_names(), "compiling");
        if self.pipeline.is_empty() {
            warn!("no transform rules, files are emitted unchanged");
        }
        bus.publish(EventKind::Transform, json!(names));

        let cancel = CancellationToken::new();
        let mut tasks = JoinSet::new();
        for (index, path) in files.iter().enumerate() {
            let path = path.clone();
            let pipeline = Arc::clone(&self.pipeline);
            let options = self.config.options.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move { (index, transform_file(path, pipeline, options, cancel).await) });
        }

        let mut slots: Vec<Option<FileResult>> = vec![None; files.len()];
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.map_err(task_failure).and_then(|(index, result)| {
                result.map(|file| (index, file))
            });
            match outcome {
                Ok((index, file)) => {
                    debug!(file = %file.file_name, "file done");
                    slots[index] = Some(file);
                }
                Err(err) => {
                    warn!(error = %err, "file failed, cancelling the batch");
                    cancel.cancel();
                    // dropping the set aborts the tasks still running
                    return Err(err);
                }
            }
        }

        let file_results = slots
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| CompileError::Fatal("a file task finished without a result".into()))?;

        Ok(CompilationResult {
            config: self.config.clone(),
            file_results,
        })
    }
}

async fn transform_file(
    path: PathBuf,
    pipeline: Arc<Pipeline>,
    options: TransformOptions,
    cancel: CancellationToken,
) -> Result<FileResult> {
    debug!(file = %path.display(), "reading");
    let source = tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| CompileError::Io {
            path: path.clone(),
            source,
        })?;

    if cancel.is_cancelled() {
        return Err(CompileError::Cancelled);
    }

    // Parsing and rewriting are CPU bound
    tokio::task::spawn_blocking(move || transform_source(&path, &source, &pipeline, &options, &cancel))
        .await
        .map_err(task_failure)?
}

/// Parse, rewrite and emit one file's source text
pub fn transform_source(
    path: &Path,
    source: &str,
    pipeline: &Pipeline,
    options: &TransformOptions,
    cancel: &CancellationToken,
) -> Result<FileResult> {
    let mut diagnostics = Vec::new();

    let unit = if options.finish_on_error {
        let (unit, issues) = tsr_parser::parse_lenient(path, source)?;
        for issue in issues {
            diagnostics.push(Diagnostic::new(
                unit.file_name(),
                Some(issue.position),
                Category::Error,
                issue.message,
            ));
        }
        unit
    } else {
        tsr_parser::parse(path, source)?
    };

    let unit = pipeline.run_with_cancel(unit, &mut diagnostics, cancel)?;

    Ok(FileResult {
        file_name: unit.file_name().to_string(),
        file_path: path.to_path_buf(),
        output_text: unit.emit(),
        diagnostics,
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// A file task panicked or was aborted
pub(crate) fn task_failure(err: JoinError) -> CompileError {
    if err.is_panic() {
        let panic = err.into_panic();
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        CompileError::Fatal(format!("file task panicked: {}", message))
    } else {
        CompileError::Fatal(format!("file task did not complete: {}", err))
    }
}
