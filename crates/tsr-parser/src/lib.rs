//! TypeScript source trees for tsr
//!
//! Parsing is delegated to the tree-sitter TypeScript grammar. The concrete
//! syntax tree is converted into an owned [`Node`] tree in which every token
//! keeps its exact text and the trivia in front of it, so
//! `parse(text)?.emit() == text` for any input the grammar accepts.

pub mod ast;
pub mod error;

pub use ast::*;
pub use error::{ParseError, SyntaxIssue};

use std::path::Path;

use tracing::{debug, warn};

/// Deepest syntax tree accepted, counting the root as level 0
///
/// Conversion and every rewriting pass recurse once per level; deeper
/// trees are rejected with [`ParseError::TooDeep`] before any of that runs.
pub const MAX_DEPTH: usize = 256;

/// Which grammar to parse a file with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    TypeScript,
    Tsx,
}

impl Dialect {
    /// `.tsx` files get the TSX grammar, everything else plain TypeScript
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("tsx") => Dialect::Tsx,
            _ => Dialect::TypeScript,
        }
    }

    fn language(self) -> tree_sitter::Language {
        match self {
            Dialect::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Dialect::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }
}

/// Parse a file, failing on the first syntax error
pub fn parse(path: impl AsRef<Path>, source: &str) -> Result<SourceUnit, ParseError> {
    let path = path.as_ref();
    let (unit, issues) = parse_lenient(path, source)?;
    match issues.into_iter().next() {
        Some(issue) => Err(ParseError::Syntax {
            path: path.to_path_buf(),
            issue,
        }),
        None => Ok(unit),
    }
}

/// Parse a file, keeping the error-tolerant tree even if it has syntax errors
///
/// The issues are returned next to the tree in source order.
pub fn parse_lenient(
    path: impl AsRef<Path>,
    source: &str,
) -> Result<(SourceUnit, Vec<SyntaxIssue>), ParseError> {
    let path = path.as_ref();
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&Dialect::for_path(path).language())
        .map_err(|e| ParseError::Language(e.to_string()))?;

    let tree = parser.parse(source, None).ok_or_else(|| ParseError::NoTree {
        path: path.to_path_buf(),
    })?;

    if let Some(point) = first_too_deep(&tree) {
        let position = Position {
            line: point.row + 1,
            column: point.column + 1,
        };
        warn!(file = %path.display(), %position, limit = MAX_DEPTH, "syntax tree too deep");
        return Err(ParseError::TooDeep {
            path: path.to_path_buf(),
            position,
            limit: MAX_DEPTH,
        });
    }

    let mut builder = TreeBuilder {
        source,
        consumed: 0,
        issues: Vec::new(),
    };
    let root = builder.build(tree.root_node(), true);
    let trailing = source.get(builder.consumed..).unwrap_or_default();

    debug!(
        file = %path.display(),
        bytes = source.len(),
        issues = builder.issues.len(),
        "parsed source unit"
    );

    Ok((SourceUnit::new(path, root, trailing), builder.issues))
}

/// Start of the first node nested deeper than [`MAX_DEPTH`], found with a
/// cursor so the walk itself needs no recursion
fn first_too_deep(tree: &tree_sitter::Tree) -> Option<tree_sitter::Point> {
    let mut cursor = tree.walk();
    let mut depth = 0;
    loop {
        if depth > MAX_DEPTH {
            return Some(cursor.node().start_position());
        }
        if cursor.goto_first_child() {
            depth += 1;
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return None;
            }
            depth -= 1;
        }
    }
}

/// Converts a tree-sitter tree into owned nodes, assigning every byte of the
/// source to exactly one leaf (as text or leading trivia).
struct TreeBuilder<'s> {
    source: &'s str,
    consumed: usize,
    issues: Vec<SyntaxIssue>,
}

impl<'s> TreeBuilder<'s> {
    fn build(&mut self, node: tree_sitter::Node<'_>, is_root: bool) -> Node {
        let point = node.start_position();
        let position = Position {
            line: point.row + 1,
            column: point.column + 1,
        };

        if node.is_error() {
            let snippet: String = self.slice(node.start_byte(), node.end_byte()).chars().take(20).collect();
            self.issues.push(SyntaxIssue {
                position,
                message: format!("unexpected `{}`", snippet.trim()),
            });
        } else if node.is_missing() {
            self.issues.push(SyntaxIssue {
                position,
                message: format!("missing `{}`", node.kind()),
            });
        }

        if node.child_count() == 0 && !is_root {
            let start = node.start_byte().max(self.consumed);
            let end = node.end_byte().max(start);
            let leading = self.slice(self.consumed, start).to_string();
            let text = self.slice(start, end).to_string();
            self.consumed = end;
            return Node::leaf(node.kind(), text)
                .with_leading(leading)
                .with_position(position);
        }

        let mut cursor = node.walk();
        let kids: Vec<_> = node.children(&mut cursor).collect();
        let children = kids.into_iter().map(|child| self.build(child, false)).collect();
        Node::branch(node.kind(), children).with_position(position)
    }

    fn slice(&self, start: usize, end: usize) -> &'s str {
        self.source.get(start..end).unwrap_or_default()
    }
}
