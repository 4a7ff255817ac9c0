/// Owned, lossless source trees
///
/// A `Node` is either a leaf (carrying the exact source text of one token)
/// or a branch (carrying children). Every node may carry leading trivia, the
/// whitespace and unclaimed source bytes that precede it, so emitting a tree
/// is plain concatenation.

use std::fmt;
use std::path::{Path, PathBuf};

/// The grammar's name for a node, e.g. `function_declaration`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKind(&'static str);

impl NodeKind {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl From<&'static str> for NodeKind {
    fn from(name: &'static str) -> Self {
        Self(name)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// 1-based line and column of a node in its original file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.line, self.column)
    }
}

/// A node of a source tree
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    kind: NodeKind,
    leading: String,
    text: Option<String>,
    children: Vec<Node>,
    position: Option<Position>,
}

impl Node {
    /// A token with its exact source text
    pub fn leaf(kind: impl Into<NodeKind>, text: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            leading: String::new(),
            text: Some(text.into()),
            children: Vec::new(),
            position: None,
        }
    }

    /// An interior node
    pub fn branch(kind: impl Into<NodeKind>, children: Vec<Node>) -> Self {
        Self {
            kind: kind.into(),
            leading: String::new(),
            text: None,
            children,
            position: None,
        }
    }

    pub fn with_leading(mut self, leading: impl Into<String>) -> Self {
        self.leading = leading.into();
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is(&self, kind: NodeKind) -> bool {
        self.kind == kind
    }

    pub fn is_leaf(&self) -> bool {
        self.text.is_some()
    }

    /// Source text of a leaf; `None` for branches
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Position in the original file; `None` for synthesized nodes
    pub fn position(&self) -> Option<Position> {
        self.position
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<Node> {
        &mut self.children
    }

    /// Replace the children of this node, keeping its kind and trivia
    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }

    /// The trivia that precedes this node's first token
    ///
    /// Branches built by the parser keep no trivia of their own, so this
    /// walks down to the first leaf.
    pub fn leading_trivia(&self) -> &str {
        if !self.leading.is_empty() || self.is_leaf() {
            return &self.leading;
        }
        match self.children.first() {
            Some(first) => first.leading_trivia(),
            None => "",
        }
    }

    /// Move the leading trivia out of this node (or its first leaf)
    pub fn take_leading_trivia(&mut self) -> String {
        if !self.leading.is_empty() || self.is_leaf() {
            return std::mem::take(&mut self.leading);
        }
        match self.children.first_mut() {
            Some(first) => first.take_leading_trivia(),
            None => String::new(),
        }
    }

    /// First direct child of the given kind
    pub fn child_of_kind(&self, kind: NodeKind) -> Option<&Node> {
        self.children.iter().find(|child| child.kind == kind)
    }

    /// Index of the first direct child of the given kind
    pub fn child_index(&self, kind: NodeKind) -> Option<usize> {
        self.children.iter().position(|child| child.kind == kind)
    }

    /// Pre-order iterator over this node and all of its descendants
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    pub fn contains_kind(&self, kind: NodeKind) -> bool {
        self.descendants().any(|node| node.kind == kind)
    }

    /// The emitted source of this node, including its leading trivia
    pub fn to_source(&self) -> String {
        let mut out = String::new();
        self.write_source(&mut out);
        out
    }

    /// The emitted source of this node, without its leading trivia
    pub fn to_source_trimmed(&self) -> String {
        let mut copy = self.clone();
        copy.take_leading_trivia();
        copy.to_source()
    }

    fn write_source(&self, out: &mut String) {
        out.push_str(&self.leading);
        match &self.text {
            Some(text) => out.push_str(text),
            None => {
                for child in &self.children {
                    child.write_source(out);
                }
            }
        }
    }
}

/// Pre-order traversal, see [`Node::descendants`]
pub struct Descendants<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// The parsed structural representation of one input file
#[derive(Debug, Clone, PartialEq)]
pub struct SourceUnit {
    file_name: String,
    file_path: PathBuf,
    tree: Node,
    trailing: String,
}

impl SourceUnit {
    pub fn new(file_path: impl Into<PathBuf>, tree: Node, trailing: impl Into<String>) -> Self {
        let file_path = file_path.into();
        let file_name = file_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_path.display().to_string());
        Self {
            file_name,
            file_path,
            tree,
            trailing: trailing.into(),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn tree(&self) -> &Node {
        &self.tree
    }

    /// Take the tree out for a rewriting pass; see [`SourceUnit::with_tree`]
    pub fn into_tree(self) -> (Node, SourceUnitShell) {
        (
            self.tree,
            SourceUnitShell {
                file_name: self.file_name,
                file_path: self.file_path,
                trailing: self.trailing,
            },
        )
    }

    /// Emit the unit back to source text
    pub fn emit(&self) -> String {
        let mut out = self.tree.to_source();
        out.push_str(&self.trailing);
        out
    }
}

/// A `SourceUnit` whose tree is out for rewriting
///
/// Identity (name, path) and trailing trivia stay here so a new tree can be
/// put back without touching them.
#[derive(Debug, Clone)]
pub struct SourceUnitShell {
    file_name: String,
    file_path: PathBuf,
    trailing: String,
}

impl SourceUnitShell {
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn with_tree(self, tree: Node) -> SourceUnit {
        SourceUnit {
            file_name: self.file_name,
            file_path: self.file_path,
            tree,
            trailing: self.trailing,
        }
    }
}
