/// Integration tests for the lifecycle events a run sends to the status process

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::TempDir;
use tsr_compiler::{
    bridge, envelope_channel, CompilationConfig, Compiler, Envelope, EnvelopeReceiver, EventBus,
    EventKind, Pipeline, RuleError, Session, StageContext, TransformRule,
};
use tsr_parser::{Node, NodeKind};

fn write_sources(files: &[(&str, &str)]) -> (TempDir, Vec<PathBuf>) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let paths = files
        .iter()
        .map(|(name, source)| {
            let path = dir.path().join(name);
            fs::write(&path, source).expect("failed to write source");
            path
        })
        .collect();
    (dir, paths)
}

/// Run a whole session over `paths` and collect what crossed the channel
async fn run_session(paths: Vec<PathBuf>) -> (bool, Vec<Envelope>) {
    let (sender, receiver) = envelope_channel();
    let bus = Arc::new(EventBus::new());
    bridge(&bus, &sender);

    let mut session = Session::start(Arc::clone(&bus), &paths);
    let _ = session.run(Compiler::new(CompilationConfig::new(paths))).await;
    let success = session.finish(Value::Null);

    sender.close();
    (success, drain(receiver))
}

fn drain(mut receiver: EnvelopeReceiver) -> Vec<Envelope> {
    receiver.drain_ready()
}

fn kinds(envelopes: &[Envelope]) -> Vec<EventKind> {
    envelopes.iter().map(|e| e.message).collect()
}

fn position(envelopes: &[Envelope], kind: EventKind) -> usize {
    envelopes
        .iter()
        .position(|e| e.message == kind)
        .unwrap_or_else(|| panic!("no {} envelope", kind))
}

#[tokio::test]
async fn test_successful_run_sequence() {
    let (_dir, paths) = write_sources(&[("a.ts", "let a = 1;\n"), ("b.ts", "let b = 2;\n")]);
    let (success, envelopes) = run_session(paths).await;

    assert!(success);
    assert_eq!(
        kinds(&envelopes),
        vec![
            EventKind::Start,
            EventKind::Transform,
            EventKind::Diagnostics,
            EventKind::Cleanup,
            EventKind::Stop,
            EventKind::End,
        ]
    );
    assert_eq!(envelopes[1].payload, json!(["a.ts", "b.ts"]));
    assert_eq!(envelopes[2].payload, json!([]));
    assert_eq!(envelopes[5].payload["success"], json!(true));
}

#[tokio::test]
async fn test_failed_run_reports_error_before_shutdown() {
    let (_dir, paths) = write_sources(&[("a.ts", "let a = 1;\n"), ("bad.ts", "function (\n")]);
    let (success, envelopes) = run_session(paths).await;

    assert!(!success);
    let error = position(&envelopes, EventKind::Error);
    assert!(error < position(&envelopes, EventKind::Cleanup));
    assert!(error < position(&envelopes, EventKind::Stop));
    assert!(error < position(&envelopes, EventKind::End));

    let payload = &envelopes[error].payload;
    assert_eq!(payload["kind"], json!("parse"));
    assert!(payload["message"].as_str().unwrap().contains("bad.ts"));
    assert_eq!(envelopes.last().unwrap().payload["success"], json!(false));
}

#[tokio::test]
async fn test_diagnostics_sent_once_after_transform() {
    let (_dir, paths) = write_sources(&[
        ("a.ts", "let m: Map<string, number> = new Map();\n"),
        ("b.ts", "let s: Set<string> = new Set();\n"),
    ]);
    let (_, envelopes) = run_session(paths).await;
    let kinds = kinds(&envelopes);

    assert_eq!(kinds.first(), Some(&EventKind::Start));
    assert_eq!(kinds.last(), Some(&EventKind::End));
    assert_eq!(kinds.iter().filter(|k| **k == EventKind::Diagnostics).count(), 1);

    let diagnostics = position(&envelopes, EventKind::Diagnostics);
    let last_transform = kinds.iter().rposition(|k| *k == EventKind::Transform).unwrap();
    assert!(last_transform < diagnostics);
    assert!(diagnostics < position(&envelopes, EventKind::Cleanup));

    // One warning per file, in input order
    let lines: Vec<&str> = envelopes[diagnostics]
        .payload
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("a.ts(1,8): warning:"));
    assert!(lines[1].starts_with("b.ts(1,8): warning:"));
}

#[tokio::test]
async fn test_config_error_still_completes_the_lifecycle() {
    let (sender, receiver) = envelope_channel();
    let bus = Arc::new(EventBus::new());
    bridge(&bus, &sender);

    let mut session = Session::start(Arc::clone(&bus), &[]);
    let result = session.run(Compiler::new(CompilationConfig::new(Vec::<PathBuf>::new()))).await;
    assert!(result.is_err());
    assert!(!session.finish(Value::Null));
    sender.close();

    let envelopes = drain(receiver);
    assert_eq!(
        kinds(&envelopes),
        vec![
            EventKind::Start,
            EventKind::Error,
            EventKind::Diagnostics,
            EventKind::Cleanup,
            EventKind::Stop,
            EventKind::End,
        ]
    );
    assert_eq!(envelopes[1].payload["kind"], json!("config"));
}

/// Panics on the first identifier it is offered
struct Panicking;

impl TransformRule for Panicking {
    fn name(&self) -> &'static str {
        "panicking"
    }

    fn interested_kinds(&self) -> &[NodeKind] {
        const KINDS: [NodeKind; 1] = [NodeKind::new("identifier")];
        &KINDS
    }

    fn substitute(&self, _node: Node, _cx: &mut StageContext<'_>) -> Result<Node, RuleError> {
        panic!("rule blew up");
    }
}

#[tokio::test]
async fn test_panicking_rule_is_reported_as_fatal() {
    let (_dir, paths) = write_sources(&[("a.ts", "let a = 1;\n")]);
    let (sender, receiver) = envelope_channel();
    let bus = Arc::new(EventBus::new());
    bridge(&bus, &sender);

    let mut session = Session::start(Arc::clone(&bus), &paths);
    let compiler = Compiler::with_pipeline(CompilationConfig::new(paths), Pipeline::new().with_rule(Panicking));
    let result = session.run(compiler).await;
    assert!(result.is_err());
    assert!(!session.finish(Value::Null));
    sender.close();

    let envelopes = drain(receiver);
    assert_eq!(
        kinds(&envelopes),
        vec![
            EventKind::Start,
            EventKind::Transform,
            EventKind::Error,
            EventKind::Diagnostics,
            EventKind::Cleanup,
            EventKind::Stop,
            EventKind::End,
        ]
    );
    let error = &envelopes[2].payload;
    assert_eq!(error["kind"], json!("fatal"));
    assert!(error["message"].as_str().unwrap().contains("rule blew up"));
    assert_eq!(envelopes[6].payload["success"], json!(false));
}

/// Drive the `tsr` binary against a stand-in status program that logs every
/// envelope line and acknowledges them at end of input
#[cfg(unix)]
mod cli {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::process::Command;

    const STATUS_SCRIPT: &str = r#"#!/bin/sh
n=0
while IFS= read -r line; do
  printf '%s\n' "$line" >> "$TSR_TEST_LOG"
  n=$((n+1))
done
printf '{"drained":%d}\n' "$n"
"#;

    fn status_program(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("status.sh");
        fs::write(&path, STATUS_SCRIPT).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn logged(log: &PathBuf) -> Vec<Envelope> {
        fs::read_to_string(log)
            .unwrap_or_default()
            .lines()
            .map(|line| Envelope::from_line(line).unwrap())
            .collect()
    }

    #[test]
    fn test_cli_writes_outputs_and_drains_status() {
        let (dir, paths) = write_sources(&[
            ("a.ts", "let a: number = 1;\n"),
            ("b.ts", "let b = 2;\n"),
        ]);
        let log = dir.path().join("status.log");
        let out_dir = dir.path().join("out");

        let status = Command::new(env!("CARGO_BIN_EXE_tsr"))
            .args(&paths)
            .arg("-o")
            .arg(&out_dir)
            .env("TSR_STATUS_BIN", status_program(&dir))
            .env("TSR_TEST_LOG", &log)
            .status()
            .unwrap();
        assert!(status.success());

        let a = fs::read_to_string(out_dir.join("a.ts")).unwrap();
        assert!(a.contains("t.nullable(t.number()).assert(1)"));
        assert_eq!(fs::read_to_string(out_dir.join("b.ts")).unwrap(), "let b = 2;\n");
        // Copied out, so the temp folder is gone
        assert!(!dir.path().join(".tsr").exists());

        let envelopes = logged(&log);
        assert_eq!(
            kinds(&envelopes),
            vec![
                EventKind::Start,
                EventKind::Transform,
                EventKind::Diagnostics,
                EventKind::Cleanup,
                EventKind::Stop,
                EventKind::End,
            ]
        );
    }

    #[test]
    fn test_cli_failure_exits_nonzero_after_error_envelope() {
        let (dir, paths) = write_sources(&[("bad.ts", "function (\n")]);
        let log = dir.path().join("status.log");

        let status = Command::new(env!("CARGO_BIN_EXE_tsr"))
            .args(&paths)
            .arg("--keep-temp-files")
            .env("TSR_STATUS_BIN", status_program(&dir))
            .env("TSR_TEST_LOG", &log)
            .status()
            .unwrap();
        assert_eq!(status.code(), Some(1));

        let envelopes = logged(&log);
        assert!(envelopes.iter().any(|e| e.message == EventKind::Error));
        assert_eq!(envelopes.last().map(|e| e.message), Some(EventKind::End));
    }

    #[test]
    fn test_cli_rejects_inputs_sharing_a_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = Vec::new();
        for sub in ["a", "b"] {
            let path = dir.path().join(sub).join("x.ts");
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, format!("let {sub}: number = 1;\n")).unwrap();
            paths.push(path);
        }
        let log = dir.path().join("status.log");

        let status = Command::new(env!("CARGO_BIN_EXE_tsr"))
            .args(&paths)
            .env("TSR_STATUS_BIN", status_program(&dir))
            .env("TSR_TEST_LOG", &log)
            .status()
            .unwrap();
        assert_eq!(status.code(), Some(1));
        assert!(!dir.path().join("a").join(".tsr").exists());

        let error = logged(&log)
            .into_iter()
            .find(|e| e.message == EventKind::Error)
            .expect("no error envelope");
        assert_eq!(error.payload["kind"], json!("config"));
        assert!(error.payload["message"].as_str().unwrap().contains("x.ts"));
    }

    #[test]
    fn test_cli_without_files_prints_help() {
        let output = Command::new(env!("CARGO_BIN_EXE_tsr")).output().unwrap();
        assert!(output.status.success());
        assert!(String::from_utf8_lossy(&output.stdout).contains("Usage"));
    }

    #[test]
    fn test_cli_rejects_bad_compiler_options() {
        let (dir, paths) = write_sources(&[("a.ts", "let a = 1;\n")]);
        let log = dir.path().join("status.log");

        let status = Command::new(env!("CARGO_BIN_EXE_tsr"))
            .args(&paths)
            .args(["-c", r#"{"strictNullChecks": "yes"}"#])
            .env("TSR_STATUS_BIN", status_program(&dir))
            .env("TSR_TEST_LOG", &log)
            .status()
            .unwrap();
        assert_eq!(status.code(), Some(1));

        let error = logged(&log)
            .into_iter()
            .find(|e| e.message == EventKind::Error)
            .expect("no error envelope");
        assert_eq!(error.payload["kind"], json!("config"));
    }
}
