use tsr_parser::{Node, NodeKind};

use super::{is_function_like, prepend_to_body, wrap_node, RuleOptions, FUNCTION_KINDS};
use crate::rule::{RuleError, StageContext, TransformRule};
use crate::types::TYPE_ANNOTATION;

const RETURN_STATEMENT: NodeKind = NodeKind::new("return_statement");
const STATEMENT_BLOCK: NodeKind = NodeKind::new("statement_block");

/// Checks the values a function returns against its return type
///
/// ```text
/// function f(): number {        function f(): number {
///     return g();          =>       const _returnType = t.return(t.number());
/// }                                 return _returnType.assert(g());
///                               }
/// ```
pub struct ReturnChecks {
    options: RuleOptions,
}

impl ReturnChecks {
    pub fn new(options: RuleOptions) -> Self {
        Self { options }
    }
}

impl TransformRule for ReturnChecks {
    fn name(&self) -> &'static str {
        "return-checks"
    }

    fn interested_kinds(&self) -> &[NodeKind] {
        &FUNCTION_KINDS
    }

    fn substitute(&self, node: Node, cx: &mut StageContext<'_>) -> Result<Node, RuleError> {
        // The return type is the only annotation directly under the function
        let Some(annotation) = node.child_of_kind(TYPE_ANNOTATION) else {
            return Ok(node);
        };
        if node.child_of_kind(STATEMENT_BLOCK).is_none() {
            return Ok(node);
        }
        let Some(ty) = self.options.reflector().reflect_annotation(annotation, cx) else {
            return Ok(node);
        };
        let lib = &self.options.lib;
        if ty == format!("{lib}.void()") || ty == format!("{lib}.any()") {
            return Ok(node);
        }

        let checker = format!("{}returnType", self.options.namespace);
        let declaration = format!("const {checker} = {lib}.return({ty});");

        let children = node
            .children()
            .iter()
            .cloned()
            .map(|child| {
                if child.is(STATEMENT_BLOCK) {
                    wrap_returns(child, &checker)
                } else {
                    child
                }
            })
            .collect();
        let node = node.with_children(children);
        Ok(prepend_to_body(node, vec![declaration]))
    }
}

/// Wrap the value of every `return` in this body, leaving nested functions
/// (which carry their own return type) alone
fn wrap_returns(node: Node, checker: &str) -> Node {
    if is_function_like(node.kind()) || node.is_leaf() {
        return node;
    }
    if node.is(RETURN_STATEMENT) {
        let children = node
            .children()
            .iter()
            .cloned()
            .map(|child| match child.kind().as_str() {
                "return" | ";" => child,
                _ => wrap_node(child, format!("{checker}.assert("), ")"),
            })
            .collect();
        return node.with_children(children);
    }

    let children = node
        .children()
        .iter()
        .cloned()
        .map(|child| wrap_returns(child, checker))
        .collect();
    node.with_children(children)
}
