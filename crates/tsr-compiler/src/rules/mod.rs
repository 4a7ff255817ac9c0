//! The default rule set
//!
//! Inserts runtime type checks derived from type annotations. The order
//! below is the execution order: `LibImport` must come last because it looks
//! for the checks inserted by the other rules.

mod lib_import;
mod parameters;
mod returns;
mod variables;

pub use lib_import::LibImport;
pub use parameters::ParameterChecks;
pub use returns::ReturnChecks;
pub use variables::VariableChecks;

use tsr_parser::{Node, NodeKind};

use crate::config::TransformOptions;
use crate::pipeline::Pipeline;
use crate::types::TypeReflector;

/// Kind given to every node a rule synthesizes
pub const RUNTIME_CHECK: NodeKind = NodeKind::new("runtime_check");

const STATEMENT_BLOCK: NodeKind = NodeKind::new("statement_block");
const OPEN_BRACE: NodeKind = NodeKind::new("{");

/// Kinds that introduce their own parameter list, return type and body
const FUNCTION_KINDS: [NodeKind; 5] = [
    NodeKind::new("function_declaration"),
    NodeKind::new("function_expression"),
    NodeKind::new("generator_function_declaration"),
    NodeKind::new("arrow_function"),
    NodeKind::new("method_definition"),
];

fn is_function_like(kind: NodeKind) -> bool {
    FUNCTION_KINDS.contains(&kind)
}

/// The subset of [`TransformOptions`] the rules care about
#[derive(Debug, Clone)]
pub struct RuleOptions {
    pub lib: String,
    pub lib_module: String,
    pub namespace: String,
    pub strict_null_checks: bool,
}

impl RuleOptions {
    pub fn reflector(&self) -> TypeReflector<'_> {
        TypeReflector::new(&self.lib, self.strict_null_checks)
    }
}

impl From<&TransformOptions> for RuleOptions {
    fn from(options: &TransformOptions) -> Self {
        Self {
            lib: options.lib_identifier.clone(),
            lib_module: options.lib_module.clone(),
            namespace: options.namespace.clone(),
            strict_null_checks: options.compiler_options.strict_null_checks,
        }
    }
}

/// The statically ordered default pipeline
pub fn default_pipeline(options: &RuleOptions) -> Pipeline {
    Pipeline::new()
        .with_rule(ParameterChecks::new(options.clone()))
        .with_rule(ReturnChecks::new(options.clone()))
        .with_rule(VariableChecks::new(options.clone()))
        .with_rule(LibImport::new(options.clone()))
}

/// Insert statements right after the opening brace of a function's body.
///
/// Functions without a block body are returned unchanged.
fn prepend_to_body(mut function: Node, statements: Vec<String>) -> Node {
    let Some(block_index) = function.child_index(STATEMENT_BLOCK) else {
        return function;
    };
    let block = &mut function.children_mut()[block_index];
    let Some(brace) = block.child_index(OPEN_BRACE) else {
        return function;
    };

    let indent = body_indent(block, brace);
    let children = block.children_mut();
    for (offset, statement) in statements.into_iter().enumerate() {
        let check = Node::leaf(RUNTIME_CHECK, statement).with_leading(format!("\n{}", indent));
        children.insert(brace + 1 + offset, check);
    }
    function
}

/// Indentation of the first statement in a block, or two spaces
fn body_indent(block: &Node, brace: usize) -> String {
    block
        .children()
        .get(brace + 1)
        .map(|first| first.leading_trivia())
        .and_then(|trivia| trivia.rfind('\n').map(|nl| trivia[nl + 1..].to_string()))
        .unwrap_or_else(|| "  ".to_string())
}

/// Surround `node` with `prefix` and `suffix`, keeping the trivia in front
/// of it
///
/// The original node stays in the tree as the middle child of the check, so
/// later stages still see everything inside it.
fn wrap_node(mut node: Node, prefix: String, suffix: &str) -> Node {
    let leading = node.take_leading_trivia();
    Node::branch(
        RUNTIME_CHECK,
        vec![
            Node::leaf(RUNTIME_CHECK, prefix).with_leading(leading),
            node,
            Node::leaf(RUNTIME_CHECK, suffix),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepend_uses_existing_indent() {
        let function = Node::branch(
            "function_declaration",
            vec![Node::branch(
                STATEMENT_BLOCK,
                vec![
                    Node::leaf(OPEN_BRACE, "{"),
                    Node::leaf("return_statement", "return;").with_leading("\n    "),
                    Node::leaf("}", "}").with_leading("\n"),
                ],
            )],
        );
        let out = prepend_to_body(function, vec!["check();".into()]);
        assert_eq!(out.to_source(), "{\n    check();\n    return;\n}");
    }

    #[test]
    fn test_wrap_node_keeps_trivia() {
        let node = Node::leaf("identifier", "x").with_leading(" ");
        let wrapped = wrap_node(node, "f(".into(), ")");
        assert_eq!(wrapped.to_source(), " f(x)");
        assert!(wrapped.is(RUNTIME_CHECK));
    }

    #[test]
    fn test_wrap_node_keeps_the_original_subtree() {
        let call = Node::branch(
            "call_expression",
            vec![
                Node::leaf("identifier", "g").with_leading("\n  "),
                Node::leaf("arguments", "()"),
            ],
        );
        let wrapped = wrap_node(call.clone(), "check(".into(), ")");
        assert_eq!(wrapped.to_source(), "\n  check(g())");
        assert_eq!(wrapped.children().len(), 3);
        assert_eq!(wrapped.children()[1].to_source(), call.to_source_trimmed());
        assert!(wrapped.contains_kind(NodeKind::new("call_expression")));
    }
}
