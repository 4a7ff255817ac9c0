use tsr_parser::{Node, NodeKind};

use super::{RuleOptions, RUNTIME_CHECK};
use crate::rule::{RuleError, StageContext, TransformRule};

const PROGRAM: [NodeKind; 1] = [NodeKind::new("program")];
const IMPORT_STATEMENT: NodeKind = NodeKind::new("import_statement");
const HASH_BANG_LINE: NodeKind = NodeKind::new("hash_bang_line");

/// Imports the runtime library into every file that uses it
pub struct LibImport {
    options: RuleOptions,
}

impl LibImport {
    pub fn new(options: RuleOptions) -> Self {
        Self { options }
    }

    fn already_imported(&self, program: &Node) -> bool {
        let quoted = [
            format!("\"{}\"", self.options.lib_module),
            format!("'{}'", self.options.lib_module),
        ];
        program
            .children()
            .iter()
            .filter(|child| child.is(IMPORT_STATEMENT))
            .map(Node::to_source)
            .any(|src| quoted.iter().any(|q| src.contains(q.as_str())))
    }
}

impl TransformRule for LibImport {
    fn name(&self) -> &'static str {
        "lib-import"
    }

    fn interested_kinds(&self) -> &[NodeKind] {
        &PROGRAM
    }

    fn substitute(&self, node: Node, _cx: &mut StageContext<'_>) -> Result<Node, RuleError> {
        if !node.contains_kind(RUNTIME_CHECK) || self.already_imported(&node) {
            return Ok(node);
        }

        let import = Node::leaf(
            IMPORT_STATEMENT,
            format!("import {} from \"{}\";", self.options.lib, self.options.lib_module),
        );
        let mut children = node.children().to_vec();
        // A `#!` line must stay the first line of the file
        if children.first().is_some_and(|first| first.is(HASH_BANG_LINE)) {
            children.insert(1, import.with_leading("\n"));
            return Ok(node.with_children(children));
        }
        if let Some(first) = children.first_mut() {
            let leading = first.take_leading_trivia();
            *first = first.clone().with_leading(format!("\n{}", leading));
        }
        children.insert(0, import);
        Ok(node.with_children(children))
    }
}
