use tsr_parser::{Node, NodeKind};

use super::{wrap_node, RuleOptions};
use crate::rule::{RuleError, StageContext, TransformRule};
use crate::types::TYPE_ANNOTATION;

const VARIABLE_DECLARATOR: [NodeKind; 1] = [NodeKind::new("variable_declarator")];

/// Checks initializers of annotated variables: `let x: T = t.assert(e)`
pub struct VariableChecks {
    options: RuleOptions,
}

impl VariableChecks {
    pub fn new(options: RuleOptions) -> Self {
        Self { options }
    }
}

impl TransformRule for VariableChecks {
    fn name(&self) -> &'static str {
        "variable-checks"
    }

    fn interested_kinds(&self) -> &[NodeKind] {
        &VARIABLE_DECLARATOR
    }

    fn substitute(&self, node: Node, cx: &mut StageContext<'_>) -> Result<Node, RuleError> {
        let Some(annotation) = node.child_of_kind(TYPE_ANNOTATION) else {
            return Ok(node);
        };
        let Some(value_index) = node
            .children()
            .iter()
            .position(|child| child.kind().as_str() == "=")
            .map(|eq| eq + 1)
            .filter(|&index| index < node.children().len())
        else {
            return Ok(node);
        };
        let Some(ty) = self.options.reflector().reflect_annotation(annotation, cx) else {
            return Ok(node);
        };

        let mut node = node;
        let children = node.children_mut();
        let value = children.remove(value_index);
        children.insert(value_index, wrap_node(value, format!("{ty}.assert("), ")"));
        Ok(node)
    }
}
