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

fn request_ok(
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
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn exam_config(test_type: &str) -> serde_json::Value {
    json!({
        "academicYear": "2025-2026",
        "batchYear": "2023-2027",
        "subjectId": "23AD1501",
        "testType": test_type
    })
}

fn question_config() -> serde_json::Value {
    json!({
        "q1": { "co": "co1", "maxMark": 2.0 },
        "q2": { "co": "co2", "maxMark": 2.0 },
        "q11a": { "co": "co3", "maxMark": 13.0 },
        "q11b": { "co": "co3", "maxMark": 13.0 }
    })
}

// Cohort for this fixture: co1/co2/co3 each end at a 50.0% pass rate with
// one of the two students above threshold; co4..co6 have no questions.
fn students() -> serde_json::Value {
    json!([
        {
            "id": "s1",
            "slNo": 1,
            "regNo": "920823104001",
            "rollNo": "23AD01",
            "name": "Anitha",
            "marks": { "q1": 2.0, "q2": 1.0, "q11a": 10.0, "q11b": 4.0 }
        },
        {
            "id": "s2",
            "slNo": 2,
            "regNo": "920823104002",
            "rollNo": "23AD02",
            "name": "Balaji",
            "marks": { "q1": 1.0, "q2": 2.0, "q11a": 5.0, "q11b": 5.0 }
        }
    ])
}

#[test]
fn blend_with_semester_only_then_adding_internal() {
    let workspace = temp_dir("attaind-blend");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "assessments.save",
        json!({
            "examConfig": exam_config("Semester"),
            "questionConfig": question_config(),
            "students": students()
        }),
    );

    let computed = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "attainment.compute",
        json!({
            "batchYear": "2023-2027",
            "subjectId": "23AD1501",
            "indirectAttainment": { "co1": 3.0 }
        }),
    );
    let result = computed.get("attainment").expect("attainment result");

    let missing: Vec<&str> = result
        .get("missing")
        .and_then(|v| v.as_array())
        .expect("missing list")
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert_eq!(missing, vec!["Internal 1 or Internal 2", "Unit Test", "Assignment"]);

    // Internal = 0; Direct = 50*0.60; Final = 30*0.90 + 3*0.10.
    assert_eq!(
        result.pointer("/internalAttainment/co1").and_then(|v| v.as_f64()),
        Some(0.0)
    );
    assert_eq!(
        result.pointer("/directAttainment/co1").and_then(|v| v.as_f64()),
        Some(30.0)
    );
    assert_eq!(
        result.pointer("/finalAttainment/co1").and_then(|v| v.as_f64()),
        Some(27.3)
    );
    assert_eq!(result.pointer("/levels/co1").and_then(|v| v.as_u64()), Some(0));

    // COs no sitting mapped stay out of the arithmetic entirely.
    assert_eq!(
        result.pointer("/levels/co4").and_then(|v| v.as_str()),
        Some("N/A")
    );
    assert_eq!(
        result.pointer("/finalAttainment/co4").and_then(|v| v.as_f64()),
        Some(0.0)
    );

    // An Internal 1 sitting where both students clear co1 lifts the blend.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "assessments.save",
        json!({
            "examConfig": exam_config("Internal 1"),
            "questionConfig": { "q1": { "co": "co1", "maxMark": 2.0 } },
            "students": [
                {
                    "id": "s1",
                    "slNo": 1,
                    "regNo": "920823104001",
                    "rollNo": "23AD01",
                    "name": "Anitha",
                    "marks": { "q1": 2.0 }
                },
                {
                    "id": "s2",
                    "slNo": 2,
                    "regNo": "920823104002",
                    "rollNo": "23AD02",
                    "name": "Balaji",
                    "marks": { "q1": 2.0 }
                }
            ]
        }),
    );

    let recomputed = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "attainment.compute",
        json!({
            "batchYear": "2023-2027",
            "subjectId": "23AD1501",
            "indirectAttainment": { "co1": 3.0 }
        }),
    );
    let result = recomputed.get("attainment").expect("attainment result");

    let missing: Vec<&str> = result
        .get("missing")
        .and_then(|v| v.as_array())
        .expect("missing list")
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert_eq!(missing, vec!["Unit Test", "Assignment"]);

    // Internal = 100*0.60; Direct = 50*0.60 + 60*0.40; Final = 54*0.90 + 0.3.
    assert_eq!(
        result.pointer("/internalAttainment/co1").and_then(|v| v.as_f64()),
        Some(60.0)
    );
    assert_eq!(
        result.pointer("/directAttainment/co1").and_then(|v| v.as_f64()),
        Some(54.0)
    );
    assert_eq!(
        result.pointer("/finalAttainment/co1").and_then(|v| v.as_f64()),
        Some(48.9)
    );

    // The stored result is the latest blend, overwritten per key.
    let fetched = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "attainment.get",
        json!({ "batchYear": "2023-2027", "subjectId": "23AD1501" }),
    );
    let stored = fetched.get("attainment").expect("stored attainment");
    assert_eq!(
        stored.pointer("/finalAttainment/co1").and_then(|v| v.as_f64()),
        Some(48.9)
    );
    assert_eq!(
        stored.pointer("/indirectAttainment/co1").and_then(|v| v.as_f64()),
        Some(3.0)
    );
    assert!(stored.get("computedAt").and_then(|v| v.as_str()).is_some());

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
