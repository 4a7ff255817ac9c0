/// Integration tests for the transform pipeline and the default rules

use tsr_compiler::{
    default_pipeline, CompileError, Pipeline, RuleError, RuleOptions, StageContext, TransformOptions,
    TransformRule,
};
use tsr_parser::{Node, NodeKind};

/// Replaces every node of one kind by a leaf of another kind
struct Replace {
    from: [NodeKind; 1],
    to: &'static str,
    text: &'static str,
}

impl Replace {
    fn new(from: &'static str, to: &'static str, text: &'static str) -> Self {
        Self {
            from: [NodeKind::new(from)],
            to,
            text,
        }
    }
}

impl TransformRule for Replace {
    fn name(&self) -> &'static str {
        "replace"
    }

    fn interested_kinds(&self) -> &[NodeKind] {
        &self.from
    }

    fn substitute(&self, mut node: Node, _cx: &mut StageContext<'_>) -> Result<Node, RuleError> {
        let leading = node.take_leading_trivia();
        Ok(Node::leaf(self.to, self.text).with_leading(leading))
    }
}

/// Wants nothing, and fails if it is ever asked
struct Uninterested;

impl TransformRule for Uninterested {
    fn name(&self) -> &'static str {
        "uninterested"
    }

    fn interested_kinds(&self) -> &[NodeKind] {
        &[]
    }

    fn substitute(&self, _node: Node, _cx: &mut StageContext<'_>) -> Result<Node, RuleError> {
        Err(RuleError("offered a node it never asked for".into()))
    }
}

struct Failing;

impl TransformRule for Failing {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn interested_kinds(&self) -> &[NodeKind] {
        const KINDS: [NodeKind; 1] = [NodeKind::new("identifier")];
        &KINDS
    }

    fn substitute(&self, _node: Node, _cx: &mut StageContext<'_>) -> Result<Node, RuleError> {
        Err(RuleError("cannot rewrite identifiers".into()))
    }
}

/// Parse, run the pipeline and emit
fn rewrite(source: &str, pipeline: &Pipeline) -> Result<String, CompileError> {
    let unit = tsr_parser::parse("test.ts", source)?;
    let unit = pipeline.run(unit, &mut Vec::new())?;
    Ok(unit.emit())
}

fn default_rules(strict_null_checks: bool) -> Pipeline {
    let mut options = RuleOptions::from(&TransformOptions::default());
    options.strict_null_checks = strict_null_checks;
    default_pipeline(&options)
}

#[test]
fn test_stages_compose_in_order() {
    let source = "let a = 1;\n";

    let forward = Pipeline::new()
        .with_rule(Replace::new("number", "x", "X"))
        .with_rule(Replace::new("x", "y", "Y"));
    assert_eq!(rewrite(source, &forward).unwrap(), "let a = Y;\n");

    let backward = Pipeline::new()
        .with_rule(Replace::new("x", "y", "Y"))
        .with_rule(Replace::new("number", "x", "X"));
    assert_eq!(rewrite(source, &backward).unwrap(), "let a = X;\n");
}

#[test]
fn test_empty_pipeline_is_identity() {
    let source = r#"
// leading comment
export function area(w: number, h: number): number {
    /* block */ return w * h;
}

const names: string[] = ["a", 'b'];   // trailing
"#;
    assert_eq!(rewrite(source, &Pipeline::new()).unwrap(), source);
}

#[test]
fn test_rewrite_is_deterministic() {
    let source = r#"
function greet(name: string, times?: number): string {
    const prefix: string = "hi ";
    return prefix + name;
}
"#;
    let pipeline = default_rules(false);
    let first = rewrite(source, &pipeline).unwrap();
    let second = rewrite(source, &pipeline).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_empty_interest_never_fires() {
    let pipeline = Pipeline::new().with_rule(Uninterested);
    let source = "let a = b;\n";
    assert_eq!(rewrite(source, &pipeline).unwrap(), source);
}

#[test]
fn test_interest_in_absent_kind_is_noop() {
    let pipeline = Pipeline::new().with_rule(Replace::new("class_declaration", "x", "X"));
    let source = "let a = 1;\n";
    assert_eq!(rewrite(source, &pipeline).unwrap(), source);
}

#[test]
fn test_rule_error_becomes_transform_error() {
    let pipeline = Pipeline::new().with_rule(Failing);
    let err = rewrite("let a = 1;\n", &pipeline).unwrap_err();
    match err {
        CompileError::Transform { file, rule, message } => {
            assert_eq!(file, "test.ts");
            assert_eq!(rule, "failing");
            assert_eq!(message, "cannot rewrite identifiers");
        }
        other => panic!("expected a transform error, got {:?}", other),
    }
}

#[test]
fn test_parameter_checks() {
    let source = "function greet(name: string) {\n  return name;\n}\n";
    let out = rewrite(source, &default_rules(true)).unwrap();
    assert_eq!(
        out,
        "import t from \"ts-runtime/lib\";\n\
         function greet(name: string) {\n  \
         t.param(\"name\", t.string()).assert(name);\n  \
         return name;\n}\n"
    );
}

#[test]
fn test_optional_parameter_and_nullable() {
    let source = "function f(count?: number) {\n    return;\n}\n";
    let out = rewrite(source, &default_rules(false)).unwrap();
    assert!(out.contains("t.param(\"count\", t.optional(t.nullable(t.number()))).assert(count);"));
}

#[test]
fn test_return_checks() {
    let source = "function double(n: number): number {\n  return n * 2;\n}\n";
    let out = rewrite(source, &default_rules(true)).unwrap();
    assert!(out.contains("const _returnType = t.return(t.number());"));
    assert!(out.contains("return _returnType.assert(n * 2);"));
    assert!(out.starts_with("import t from \"ts-runtime/lib\";\n"));
}

#[test]
fn test_nested_function_returns_are_left_alone() {
    let source = r#"function outer(): string {
  const inner = function () {
    return 1;
  };
  return "x";
}
"#;
    let out = rewrite(source, &default_rules(true)).unwrap();
    assert!(out.contains("return 1;"));
    assert!(out.contains("return _returnType.assert(\"x\");"));
}

#[test]
fn test_void_return_is_not_checked() {
    let source = "function log(): void {\n  return;\n}\n";
    assert_eq!(rewrite(source, &default_rules(true)).unwrap(), source);
}

#[test]
fn test_variable_checks() {
    let source = "let ids: number[] = load();\n";
    let out = rewrite(source, &default_rules(true)).unwrap();
    assert_eq!(
        out,
        "import t from \"ts-runtime/lib\";\nlet ids: number[] = t.array(t.number()).assert(load());\n"
    );
}

#[test]
fn test_unannotated_code_is_untouched() {
    let source = "let x = 1;\nfunction f(a) {\n  return a;\n}\n";
    assert_eq!(rewrite(source, &default_rules(false)).unwrap(), source);
}

#[test]
fn test_existing_import_is_not_duplicated() {
    let source = "import t from \"ts-runtime/lib\";\nlet n: number = 1;\n";
    let out = rewrite(source, &default_rules(true)).unwrap();
    assert_eq!(out.matches("import t from").count(), 1);
    assert!(out.contains("let n: number = t.number().assert(1);"));
}

#[test]
fn test_unsupported_type_is_reported() {
    let unit = tsr_parser::parse("m.ts", "let m: Map<string, number> = new Map();\n").unwrap();
    let mut diagnostics = Vec::new();
    let unit = default_rules(true).run(unit, &mut diagnostics).unwrap();
    assert!(unit.emit().contains("t.any().assert(new Map())"));
    assert_eq!(diagnostics.len(), 1);
    assert!(diagnostics[0].format().starts_with("m.ts(1,8): warning:"));
}

#[test]
fn test_later_stages_see_inside_checked_returns() {
    let source = "function f(): number { return (() => { const y: number = 1; return y; })(); }";
    let out = rewrite(source, &default_rules(true)).unwrap();
    assert!(out.contains("return _returnType.assert((() => {"), "got {}", out);
    assert!(out.contains("const y: number = t.number().assert(1);"), "got {}", out);
    // the arrow function has no return type of its own
    assert!(out.contains(" return y; })());"), "got {}", out);
}

#[test]
fn test_import_goes_after_hash_bang_line() {
    let source = "#!/usr/bin/env node\nlet a: number = 1;\n";
    let out = rewrite(source, &default_rules(true)).unwrap();
    assert_eq!(
        out,
        "#!/usr/bin/env node\n\
         import t from \"ts-runtime/lib\";\n\
         let a: number = t.number().assert(1);\n"
    );
}

#[test]
fn test_long_expression_chains_are_rewritten() {
    let terms: Vec<String> = (0..100).map(|i| format!("\"s{i}\"")).collect();
    let source = format!("const s: string = {};\n", terms.join(" + "));
    let out = rewrite(&source, &default_rules(true)).unwrap();
    assert!(out.contains("const s: string = t.string().assert(\"s0\" + \"s1\""));
    assert!(out.ends_with("\"s99\");\n"));
}
