//! Compilation configuration
//!
//! Built by the CLI layer and handed to the compiler as an immutable value.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Invalid configuration supplied from outside the core
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid compiler options: {0}")]
    CompilerOptions(#[source] serde_json::Error),

    #[error("unsupported encoding `{0}` (only utf8 is supported)")]
    Encoding(String),

    #[error("invalid {field} `{value}`: must be a valid identifier")]
    Identifier { field: &'static str, value: String },

    #[error("no input files")]
    NoFiles,

    #[error("more than one input file is named `{0}`")]
    DuplicateFileName(String),
}

/// Compiler options that affect how checks are generated
///
/// Deserialized from the `--compiler-options` JSON. Unknown keys and values
/// of the wrong type are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CompilerOptions {
    /// Without this, every checked type also accepts null and undefined
    #[serde(default)]
    pub strict_null_checks: bool,
}

impl CompilerOptions {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(ConfigError::CompilerOptions)
    }
}

/// Options for one transformation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOptions {
    pub encoding: String,
    pub compiler_options: CompilerOptions,
    /// Identifier the runtime library is imported as
    pub lib_identifier: String,
    /// Module the runtime library is imported from
    pub lib_module: String,
    /// Prefix for identifiers generated into the output
    pub namespace: String,
    /// Keep going on syntax errors, reporting them as diagnostics
    pub finish_on_error: bool,
    pub keep_temp_files: bool,
    pub temp_folder: String,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            encoding: "utf8".to_string(),
            compiler_options: CompilerOptions::default(),
            lib_identifier: "t".to_string(),
            lib_module: "ts-runtime/lib".to_string(),
            namespace: "_".to_string(),
            finish_on_error: false,
            keep_temp_files: false,
            temp_folder: ".tsr".to_string(),
        }
    }
}

impl TransformOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.encoding.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => {}
            _ => return Err(ConfigError::Encoding(self.encoding.clone())),
        }

        if !is_identifier(&self.lib_identifier) {
            return Err(ConfigError::Identifier {
                field: "lib name",
                value: self.lib_identifier.clone(),
            });
        }

        // The namespace is a prefix, so it may be empty but must start an identifier
        if !self.namespace.is_empty() && !is_identifier(&self.namespace) {
            return Err(ConfigError::Identifier {
                field: "namespace",
                value: self.namespace.clone(),
            });
        }

        Ok(())
    }
}

/// Input to [`crate::Compiler`]: the files to rewrite and how
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationConfig {
    pub files: Vec<PathBuf>,
    pub options: TransformOptions,
}

impl CompilationConfig {
    pub fn new<I, P>(files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            files: files.into_iter().map(Into::into).collect(),
            options: TransformOptions::default(),
        }
    }

    pub fn options(mut self, options: TransformOptions) -> Self {
        self.options = options;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.files.is_empty() {
            return Err(ConfigError::NoFiles);
        }

        // Outputs are written by file name into one folder
        let mut seen = HashSet::new();
        for path in &self.files {
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            if !seen.insert(name.clone()) {
                return Err(ConfigError::DuplicateFileName(name));
            }
        }

        self.options.validate()
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}
