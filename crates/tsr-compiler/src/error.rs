//! Error types for the tsr compiler.

use std::path::PathBuf;

use thiserror::Error;
use tsr_parser::ParseError;

use crate::config::ConfigError;

/// Errors that can occur while compiling a batch of files.
#[derive(Debug, Error)]
pub enum CompileError {
    /// An input file could not be read.
    #[error("Error reading file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An input file is not valid source.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A rule's substitution failed.
    #[error("{file}: rule `{rule}` failed: {message}")]
    Transform {
        file: String,
        rule: &'static str,
        message: String,
    },

    /// The configuration handed to the compiler is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An uncaught failure anywhere in the orchestrator.
    #[error("Fatal error: {0}")]
    Fatal(String),

    /// A file task stopped because another file already failed.
    #[error("Cancelled after an earlier failure")]
    Cancelled,
}

impl CompileError {
    /// Short tag for the error, used in `error` envelopes
    pub fn kind(&self) -> &'static str {
        match self {
            CompileError::Io { .. } => "io",
            CompileError::Parse(_) => "parse",
            CompileError::Transform { .. } => "transform",
            CompileError::Config(_) => "config",
            CompileError::Fatal(_) => "fatal",
            CompileError::Cancelled => "cancelled",
        }
    }
}

/// Errors raised by the supervisor process channel.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to start status process {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("status process I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("status process protocol error: {0}")]
    Protocol(String),
}

/// Result type for compiler operations
pub type Result<T> = std::result::Result<T, CompileError>;
