use tsr_parser::{Node, NodeKind};

use super::{prepend_to_body, RuleOptions, FUNCTION_KINDS};
use crate::rule::{RuleError, StageContext, TransformRule};
use crate::types::TYPE_ANNOTATION;

const FORMAL_PARAMETERS: NodeKind = NodeKind::new("formal_parameters");
const REQUIRED_PARAMETER: NodeKind = NodeKind::new("required_parameter");
const OPTIONAL_PARAMETER: NodeKind = NodeKind::new("optional_parameter");
const IDENTIFIER: NodeKind = NodeKind::new("identifier");

/// Asserts annotated parameters on entry: `t.param("x", t.string()).assert(x);`
pub struct ParameterChecks {
    options: RuleOptions,
}

impl ParameterChecks {
    pub fn new(options: RuleOptions) -> Self {
        Self { options }
    }
}

impl TransformRule for ParameterChecks {
    fn name(&self) -> &'static str {
        "parameter-checks"
    }

    fn interested_kinds(&self) -> &[NodeKind] {
        &FUNCTION_KINDS
    }

    fn substitute(&self, node: Node, cx: &mut StageContext<'_>) -> Result<Node, RuleError> {
        let Some(params) = node.child_of_kind(FORMAL_PARAMETERS) else {
            return Ok(node);
        };

        let lib = &self.options.lib;
        let reflector = self.options.reflector();
        let mut checks = Vec::new();

        for param in params.children() {
            let optional = param.is(OPTIONAL_PARAMETER);
            if !optional && !param.is(REQUIRED_PARAMETER) {
                continue;
            }
            // Destructured parameters have no single name to check
            let (Some(name), Some(annotation)) = (
                param.child_of_kind(IDENTIFIER),
                param.child_of_kind(TYPE_ANNOTATION),
            ) else {
                continue;
            };
            let Some(mut ty) = reflector.reflect_annotation(annotation, cx) else {
                continue;
            };
            if optional {
                ty = format!("{}.optional({})", lib, ty);
            }
            let name = name.to_source_trimmed();
            checks.push(format!("{lib}.param(\"{name}\", {ty}).assert({name});"));
        }

        if checks.is_empty() {
            return Ok(node);
        }
        Ok(prepend_to_body(node, checks))
    }
}
