//! The transform pipeline
//!
//! An ordered list of rules. Every rule gets its own full pass over the
//! tree: the output tree of stage N is the only input of stage N+1, so later
//! rules see (and may rewrite again) whatever earlier rules produced.

use std::collections::HashSet;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use tsr_parser::{Node, NodeKind, SourceUnit};

use crate::diagnostic::Diagnostic;
use crate::error::{CompileError, Result};
use crate::rule::{RuleError, StageContext, TransformRule};

/// Deepest tree a stage walks. Parsed trees are capped at
/// [`tsr_parser::MAX_DEPTH`]; the headroom covers nesting added by rules.
const MAX_REWRITE_DEPTH: usize = tsr_parser::MAX_DEPTH + 64;

/// One rule plus the lookup set built from its interested kinds
struct Stage {
    rule: Box<dyn TransformRule>,
    kinds: HashSet<NodeKind>,
}

impl Stage {
    fn new(rule: Box<dyn TransformRule>) -> Self {
        let kinds = rule.interested_kinds().iter().copied().collect();
        Self { rule, kinds }
    }

    /// Post-order rewrite: children first, then the node itself if this
    /// stage is interested in its kind. A substitution result is not offered
    /// to the same stage again.
    fn rewrite(&self, node: Node, cx: &mut StageContext<'_>) -> std::result::Result<Node, RuleError> {
        let node = if node.is_leaf() {
            node
        } else {
            if cx.ancestors().len() >= MAX_REWRITE_DEPTH {
                return Err(RuleError(format!(
                    "tree nested deeper than {} levels",
                    MAX_REWRITE_DEPTH
                )));
            }
            let mut node = node;
            let children = std::mem::take(node.children_mut());
            cx.enter(node.kind());
            let rewritten = children
                .into_iter()
                .map(|child| self.rewrite(child, cx))
                .collect::<std::result::Result<Vec<_>, _>>();
            cx.leave();
            node.with_children(rewritten?)
        };

        if self.kinds.contains(&node.kind()) {
            trace!(rule = self.rule.name(), kind = %node.kind(), "substituting");
            self.rule.substitute(node, cx)
        } else {
            Ok(node)
        }
    }
}

/// Ordered, sequential composition of transform rules
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule; registration order is execution order
    pub fn with_rule(mut self, rule: impl TransformRule + 'static) -> Self {
        self.push(Box::new(rule));
        self
    }

    pub fn push(&mut self, rule: Box<dyn TransformRule>) {
        self.stages.push(Stage::new(rule));
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.rule.name()).collect()
    }

    /// Run every stage over the unit, in order
    pub fn run(&self, unit: SourceUnit, diagnostics: &mut Vec<Diagnostic>) -> Result<SourceUnit> {
        self.run_with_cancel(unit, diagnostics, &CancellationToken::new())
    }

    /// Like [`Pipeline::run`], but gives up between stages once `cancel` fires
    pub fn run_with_cancel(
        &self,
        unit: SourceUnit,
        diagnostics: &mut Vec<Diagnostic>,
        cancel: &CancellationToken,
    ) -> Result<SourceUnit> {
        let (mut tree, shell) = unit.into_tree();

        for stage in &self.stages {
            if cancel.is_cancelled() {
                return Err(CompileError::Cancelled);
            }
            if stage.kinds.is_empty() {
                continue;
            }

            debug!(file = shell.file_name(), rule = stage.rule.name(), "running stage");
            let mut cx = StageContext::new(shell.file_name(), diagnostics);
            tree = stage
                .rewrite(tree, &mut cx)
                .map_err(|e| CompileError::Transform {
                    file: shell.file_name().to_string(),
                    rule: stage.rule.name(),
                    message: e.0,
                })?;
        }

        Ok(shell.with_tree(tree))
    }
}
