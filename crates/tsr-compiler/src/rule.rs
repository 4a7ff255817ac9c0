//! Transform rules
//!
//! A rule declares the node kinds it wants to see and a substitution
//! function for them. Each rule runs as its own pass over the tree, see
//! [`crate::Pipeline`].

use thiserror::Error;
use tsr_parser::{Node, NodeKind, Position};

use crate::diagnostic::{Category, Diagnostic};

/// A substitution function failed
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct RuleError(pub String);

/// A single pluggable stage of the pipeline.
///
/// Rule instances are created once per compiler run and shared by every file
/// in it, so `substitute` takes `&self`. Anything a rule wants to remember
/// while walking one file lives in the [`StageContext`], which is fresh for
/// every (file, stage) pass.
pub trait TransformRule: Send + Sync {
    /// Human-readable name for this rule
    fn name(&self) -> &'static str;

    /// Kinds of nodes offered to `substitute`
    fn interested_kinds(&self) -> &[NodeKind];

    /// Rewrite one node whose children have already been processed by this
    /// stage. Return the node unchanged for a no-op.
    fn substitute(&self, node: Node, cx: &mut StageContext<'_>) -> Result<Node, RuleError>;
}

/// Per-file, per-stage state handed to a rule's substitution function
pub struct StageContext<'a> {
    file_name: &'a str,
    ancestors: Vec<NodeKind>,
    diagnostics: &'a mut Vec<Diagnostic>,
}

impl<'a> StageContext<'a> {
    pub fn new(file_name: &'a str, diagnostics: &'a mut Vec<Diagnostic>) -> Self {
        Self {
            file_name,
            ancestors: Vec::new(),
            diagnostics,
        }
    }

    pub fn file_name(&self) -> &str {
        self.file_name
    }

    /// Kinds of all enclosing nodes, outermost first
    pub fn ancestors(&self) -> &[NodeKind] {
        &self.ancestors
    }

    pub fn warn(&mut self, position: Option<Position>, message: impl Into<String>) {
        self.report(position, Category::Warning, message);
    }

    pub fn report(&mut self, position: Option<Position>, category: Category, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::new(self.file_name, position, category, message));
    }

    pub(crate) fn enter(&mut self, kind: NodeKind) {
        self.ancestors.push(kind);
    }

    pub(crate) fn leave(&mut self) {
        self.ancestors.pop();
    }
}
