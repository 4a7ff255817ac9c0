//! Parse errors.

use std::path::PathBuf;

use thiserror::Error;

use crate::ast::Position;

/// A syntax problem found in an error-tolerant parse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxIssue {
    pub position: Position,
    pub message: String,
}

/// Errors that can occur while turning source text into a `SourceUnit`.
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    /// The grammar could not be loaded into the parser.
    #[error("failed to load grammar: {0}")]
    Language(String),
    /// The parser gave up without producing a tree.
    #[error("{}: parser produced no tree", path.display())]
    NoTree { path: PathBuf },
    /// The source contains a syntax error.
    #[error("{}({}): {}", path.display(), issue.position, issue.message)]
    Syntax { path: PathBuf, issue: SyntaxIssue },
    /// The syntax tree nests deeper than the rewriter handles.
    #[error("{}({}): nesting deeper than {limit} levels", path.display(), position)]
    TooDeep {
        path: PathBuf,
        position: Position,
        limit: usize,
    },
}
