use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_attaind");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn attaind");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn error_code(resp: &serde_json::Value) -> &str {
    resp.get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

#[test]
fn router_dispatch_covers_handler_families() {
    let workspace = temp_dir("attaind-router-smoke");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health.get("ok").and_then(|v| v.as_bool()), Some(true));
    assert!(health
        .get("result")
        .and_then(|r| r.get("version"))
        .and_then(|v| v.as_str())
        .is_some());

    // Store-backed methods refuse to run before a workspace is selected.
    let no_ws = request(
        &mut stdin,
        &mut reader,
        "2",
        "assessments.list",
        json!({ "batchYear": "2023-2027" }),
    );
    assert_eq!(error_code(&no_ws), "no_workspace");

    let _ = request(
        &mut stdin,
        &mut reader,
        "3",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    // Pure calc methods work with or without a workspace.
    let scored = request(
        &mut stdin,
        &mut reader,
        "4",
        "calc.score",
        json!({
            "marks": { "q1": 2.0 },
            "questionConfig": { "q1": { "co": "co1", "maxMark": 2.0 } }
        }),
    );
    assert_eq!(scored.get("ok").and_then(|v| v.as_bool()), Some(true));

    let bad = request(&mut stdin, &mut reader, "5", "calc.score", json!({}));
    assert_eq!(error_code(&bad), "bad_params");

    let defaults = request(
        &mut stdin,
        &mut reader,
        "6",
        "setup.defaultQuestionConfig",
        json!({}),
    );
    let config = defaults
        .get("result")
        .and_then(|r| r.get("questionConfig"))
        .and_then(|v| v.as_object())
        .expect("default question config object");
    assert_eq!(config.len(), 22);
    assert_eq!(
        config
            .get("q16a")
            .and_then(|q| q.get("maxMark"))
            .and_then(|v| v.as_f64()),
        Some(15.0)
    );

    let unknown = request(&mut stdin, &mut reader, "7", "nope.method", json!({}));
    assert_eq!(error_code(&unknown), "not_implemented");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
