/// tsr CLI

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use anyhow::Context;
use clap::{ArgAction, CommandFactory, Parser};
use serde_json::json;
use tracing_subscriber::EnvFilter;
use tsr_compiler::{
    bridge, envelope_channel, CompilationConfig, CompilationResult, CompileError, Compiler,
    CompilerOptions, ConfigError, EventBus, Session, SupervisorProcess, TransformOptions,
};

const EXAMPLES: &str = "\
Examples:
  tsr src/index.ts src/util.ts
  tsr -c '{\"strictNullChecks\": true}' -o dist src/index.ts
  tsr -f -k -t .checked src/*.ts";

#[derive(Parser, Debug)]
#[command(name = "tsr")]
#[command(about = "Inserts runtime type checks into TypeScript sources")]
#[command(version, disable_version_flag = true, after_help = EXAMPLES)]
struct Args {
    /// TypeScript files to rewrite
    #[arg(value_name = "FILES")]
    files: Vec<PathBuf>,

    /// Compiler options as a JSON object
    #[arg(short, long, value_name = "JSON")]
    compiler_options: Option<String>,

    /// Keep going when a file has syntax errors
    #[arg(short, long)]
    force: bool,

    /// Do not remove the temp folder when done
    #[arg(short, long)]
    keep_temp_files: bool,

    /// Identifier the runtime library is imported as
    #[arg(short, long, value_name = "NAME")]
    lib: Option<String>,

    /// Prefix for identifiers generated into the output
    #[arg(short, long, value_name = "PREFIX")]
    namespace: Option<String>,

    /// Name of the folder rewritten files are written to
    #[arg(short, long, value_name = "NAME")]
    temp_folder: Option<String>,

    /// Copy rewritten files to this directory
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Print version
    #[arg(short = 'v', long, action = ArgAction::Version)]
    version: Option<bool>,
}

impl Args {
    fn config(&self) -> Result<CompilationConfig, ConfigError> {
        let mut options = TransformOptions {
            finish_on_error: self.force,
            keep_temp_files: self.keep_temp_files,
            ..TransformOptions::default()
        };
        if let Some(json) = &self.compiler_options {
            options.compiler_options = CompilerOptions::from_json(json)?;
        }
        if let Some(lib) = &self.lib {
            options.lib_identifier = lib.clone();
        }
        if let Some(namespace) = &self.namespace {
            options.namespace = namespace.clone();
        }
        if let Some(temp_folder) = &self.temp_folder {
            options.temp_folder = temp_folder.clone();
        }

        let config = CompilationConfig::new(self.files.iter().cloned()).options(options);
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.files.is_empty() {
        Args::command().print_help()?;
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    if !run(args).await? {
        process::exit(1);
    }
    Ok(())
}

/// Run one session with the status process attached. Returns whether every
/// file was rewritten and written out.
async fn run(args: Args) -> anyhow::Result<bool> {
    let (sender, receiver) = envelope_channel();
    let bus = Arc::new(EventBus::new());
    bridge(&bus, &sender);

    let program = SupervisorProcess::locate()?;
    let supervisor = SupervisorProcess::spawn(&program, &[], receiver)
        .with_context(|| format!("could not start status process {}", program.display()))?;

    let mut session = Session::start(Arc::clone(&bus), &args.files);
    let temp_dir = temp_dir(&args);

    match args.config() {
        Ok(config) => {
            let compiled = session.run_until(Compiler::new(config), interrupted()).await;
            if let Ok(result) = compiled {
                if let Err(e) = write_outputs(&result, &temp_dir, args.output.as_deref()).await {
                    session.report_error(&e);
                }
            }
        }
        Err(e) => session.report_error(&CompileError::Config(e)),
    }

    let removed = args.output.is_some()
        && !args.keep_temp_files
        && temp_dir.exists()
        && remove_dir(&temp_dir).await;
    let success = session.finish(json!({
        "tempFolder": temp_dir.display().to_string(),
        "removed": removed,
    }));

    let shutdown = supervisor.shutdown(&sender).await?;
    tracing::debug!(drained = shutdown.ack.drained, status = %shutdown.status, "status process exited");

    Ok(success)
}

/// Completes on Ctrl-C. Never completes if the handler can't be installed.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "could not listen for interrupts");
        std::future::pending::<()>().await;
    }
}

/// `<dir of first file>/<temp folder>`
fn temp_dir(args: &Args) -> PathBuf {
    let base = args
        .files
        .first()
        .and_then(|file| file.parent())
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let folder = args.temp_folder.clone().unwrap_or_else(|| TransformOptions::default().temp_folder);
    base.join(folder)
}

async fn write_outputs(
    result: &CompilationResult,
    temp_dir: &Path,
    output_dir: Option<&Path>,
) -> Result<(), CompileError> {
    let io_error = |path: &Path| {
        let path = path.to_path_buf();
        move |source: std::io::Error| CompileError::Io { path, source }
    };

    tokio::fs::create_dir_all(temp_dir).await.map_err(io_error(temp_dir))?;
    for file in &result.file_results {
        let target = temp_dir.join(&file.file_name);
        tokio::fs::write(&target, &file.output_text)
            .await
            .map_err(io_error(&target))?;
    }

    if let Some(dir) = output_dir {
        tokio::fs::create_dir_all(dir).await.map_err(io_error(dir))?;
        for file in &result.file_results {
            let from = temp_dir.join(&file.file_name);
            let to = dir.join(&file.file_name);
            tokio::fs::copy(&from, &to).await.map_err(io_error(&to))?;
        }
    }
    Ok(())
}

async fn remove_dir(dir: &Path) -> bool {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "could not remove temp folder");
            false
        }
    }
}
