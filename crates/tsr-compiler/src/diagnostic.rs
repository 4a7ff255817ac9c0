//! Diagnostics collected while rewriting.

use std::fmt;

use serde::{Deserialize, Serialize};
use tsr_parser::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Error,
    Warning,
    Message,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Category::Error => "error",
            Category::Warning => "warning",
            Category::Message => "message",
        })
    }
}

/// A message about one file, optionally tied to a position in it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub file: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub category: Category,
    pub message: String,
}

impl Diagnostic {
    pub fn new(
        file: impl Into<String>,
        position: Option<Position>,
        category: Category,
        message: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            line: position.map(|p| p.line),
            column: position.map(|p| p.column),
            category,
            message: message.into(),
        }
    }

    /// `file(line,col): category: message`, or an empty string if there is
    /// nothing to say
    pub fn format(&self) -> String {
        let message = self.message.trim();
        if message.is_empty() {
            return String::new();
        }
        match (self.line, self.column) {
            (Some(line), Some(column)) => {
                format!("{}({},{}): {}: {}", self.file, line, column, self.category, message)
            }
            _ => format!("{}: {}: {}", self.file, self.category, message),
        }
    }
}

/// Format a batch of diagnostics, dropping empty entries
pub fn format_all<'a>(diagnostics: impl IntoIterator<Item = &'a Diagnostic>) -> Vec<String> {
    diagnostics
        .into_iter()
        .map(Diagnostic::format)
        .filter(|text| !text.trim().is_empty())
        .collect()
}
