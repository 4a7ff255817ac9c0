//! Mapping from type annotations to runtime reflection expressions
//!
//! `x: string[]` becomes `t.array(t.string())`. Types that cannot be checked
//! at runtime fall back to `t.any()` with a warning.

use tsr_parser::{Node, NodeKind};

use crate::rule::StageContext;

pub const TYPE_ANNOTATION: NodeKind = NodeKind::new("type_annotation");
const PREDEFINED_TYPE: NodeKind = NodeKind::new("predefined_type");
const ARRAY_TYPE: NodeKind = NodeKind::new("array_type");
const UNION_TYPE: NodeKind = NodeKind::new("union_type");
const PARENTHESIZED_TYPE: NodeKind = NodeKind::new("parenthesized_type");
const LITERAL_TYPE: NodeKind = NodeKind::new("literal_type");

/// Builds reflection expressions against the runtime library identifier
pub struct TypeReflector<'a> {
    lib: &'a str,
    strict_null_checks: bool,
}

impl<'a> TypeReflector<'a> {
    pub fn new(lib: &'a str, strict_null_checks: bool) -> Self {
        Self {
            lib,
            strict_null_checks,
        }
    }

    /// Reflect the type inside a `: T` annotation
    pub fn reflect_annotation(&self, annotation: &Node, cx: &mut StageContext<'_>) -> Option<String> {
        let ty = annotation
            .children()
            .iter()
            .find(|child| child.kind().as_str() != ":")?;
        Some(self.reflect(ty, cx))
    }

    /// Reflect a type node, applying null-check semantics at the top level
    pub fn reflect(&self, ty: &Node, cx: &mut StageContext<'_>) -> String {
        let (expr, admits_null) = self.reflect_inner(ty, cx);
        if self.strict_null_checks || admits_null {
            expr
        } else {
            format!("{}.nullable({})", self.lib, expr)
        }
    }

    /// Returns the expression and whether the type already admits null
    fn reflect_inner(&self, ty: &Node, cx: &mut StageContext<'_>) -> (String, bool) {
        let lib = self.lib;
        let kind = ty.kind();

        if kind == PREDEFINED_TYPE || kind == LITERAL_TYPE {
            let text = ty.to_source_trimmed();
            match text.as_str() {
                "any" | "unknown" | "void" | "never" | "null" | "undefined" => {
                    return (format!("{}.{}()", lib, text), true);
                }
                "string" | "number" | "boolean" | "symbol" | "object" | "bigint" => {
                    return (format!("{}.{}()", lib, text), false);
                }
                _ if kind == LITERAL_TYPE => {
                    return (format!("{}.literal({})", lib, text), false);
                }
                _ => {}
            }
        } else if kind == ARRAY_TYPE {
            if let Some(element) = ty.children().first() {
                let (inner, _) = self.reflect_inner(element, cx);
                return (format!("{}.array({})", lib, inner), false);
            }
        } else if kind == UNION_TYPE {
            let mut members = Vec::new();
            collect_union(ty, &mut members);
            let mut admits_null = false;
            let reflected: Vec<String> = members
                .into_iter()
                .map(|member| {
                    let (expr, nullable) = self.reflect_inner(member, cx);
                    admits_null |= nullable;
                    expr
                })
                .collect();
            return (format!("{}.union({})", lib, reflected.join(", ")), admits_null);
        } else if kind == PARENTHESIZED_TYPE {
            if let Some(inner) = ty.children().iter().find(|c| !matches!(c.kind().as_str(), "(" | ")")) {
                return self.reflect_inner(inner, cx);
            }
        }

        cx.warn(
            ty.position(),
            format!("type `{}` is not checked at runtime", ty.to_source_trimmed()),
        );
        (format!("{}.any()", lib), true)
    }
}

/// Flatten `A | B | C`, which the grammar nests to the left
fn collect_union<'n>(ty: &'n Node, members: &mut Vec<&'n Node>) {
    for child in ty.children() {
        if child.kind().as_str() == "|" {
            continue;
        }
        if child.kind() == UNION_TYPE {
            collect_union(child, members);
        } else {
            members.push(child);
        }
    }
}
