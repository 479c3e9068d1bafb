use rusqlite::Connection;
use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
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

/// Seeds the workspace mirror directly, the way an earlier revision of the
/// register would have written it.
fn seed_results(workspace: &Path, value: &str) {
    let conn = Connection::open(workspace.join("results.sqlite3")).expect("open seed db");
    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT
        )",
        [],
    )
    .expect("create settings");
    conn.execute(
        "INSERT INTO settings(key, value) VALUES('results', ?)",
        [value],
    )
    .expect("seed results");
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_resultsd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn resultsd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    n: &mut u32,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    *n += 1;
    let id = n.to_string();
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
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "expected ok for {}: {}",
        method,
        value
    );
    value.get("result").cloned().expect("result payload")
}

#[test]
fn legacy_string_typed_mirror_loads_and_ranks() {
    let workspace = temp_dir("resultsd-legacy-mirror");
    seed_results(
        &workspace,
        r#"[
            {"rollNo":"12","obtained":"450","maximum":"500","percentage":90.0,
             "subjects":{"1":{"id":1,"name":"Maths","obtained":"450","maximum":"500"}}},
            {"rollNo":7,"obtained":300,"maximum":500,"percentage":60.0}
        ]"#,
    );

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let n = &mut 0;

    let selected = request_ok(
        &mut stdin,
        &mut reader,
        n,
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert_eq!(selected["recordCount"], json!(2));

    let listed = request_ok(&mut stdin, &mut reader, n, "results.list", json!({}));
    let records = listed["records"].as_array().expect("records");
    assert_eq!(records[0]["rollNo"], json!(12));
    // The written layout keeps marks as strings.
    assert_eq!(records[0]["obtained"], json!("450"));
    assert!(records[1].get("subjects").is_none());

    let table = request_ok(&mut stdin, &mut reader, n, "results.tableModel", json!({}));
    let rows = table["rows"].as_array().expect("rows");
    assert_eq!(rows[0]["rollNo"], json!(7));
    assert_eq!(rows[0]["percentage"].as_f64(), Some(60.0));
    assert_eq!(rows[0]["rank"], json!(2));
    assert_eq!(rows[1]["rollNo"], json!(12));
    assert_eq!(rows[1]["rank"], json!(1));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn malformed_mirror_recovers_empty_and_is_overwritten() {
    let workspace = temp_dir("resultsd-garbage-mirror");
    seed_results(&workspace, "definitely not json");

    {
        let (mut child, mut stdin, mut reader) = spawn_sidecar();
        let n = &mut 0;

        // Corruption never blocks the workspace; it just starts empty.
        let selected = request_ok(
            &mut stdin,
            &mut reader,
            n,
            "workspace.select",
            json!({ "path": workspace.to_string_lossy() }),
        );
        assert_eq!(selected["recordCount"], json!(0));

        let _ = request_ok(
            &mut stdin,
            &mut reader,
            n,
            "form.updateField",
            json!({ "field": "rollNo", "value": "3" }),
        );
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            n,
            "form.updateField",
            json!({ "field": "obtained", "subjectId": 1, "value": "40" }),
        );
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            n,
            "form.updateField",
            json!({ "field": "maximum", "subjectId": 1, "value": "50" }),
        );
        let _ = request_ok(&mut stdin, &mut reader, n, "form.submit", json!({}));

        drop(stdin);
        let _ = child.wait();
    }

    // The first write replaced the garbage with a good mirror.
    {
        let (mut child, mut stdin, mut reader) = spawn_sidecar();
        let n = &mut 0;
        let selected = request_ok(
            &mut stdin,
            &mut reader,
            n,
            "workspace.select",
            json!({ "path": workspace.to_string_lossy() }),
        );
        assert_eq!(selected["recordCount"], json!(1));
        let listed = request_ok(&mut stdin, &mut reader, n, "results.list", json!({}));
        assert_eq!(listed["records"][0]["rollNo"], json!(3));

        drop(stdin);
        let _ = child.wait();
    }

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn new_submissions_append_to_a_legacy_mirror() {
    let workspace = temp_dir("resultsd-append-legacy");
    seed_results(
        &workspace,
        r#"[{"rollNo":"1","obtained":"250","maximum":"500","percentage":50.0}]"#,
    );

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let n = &mut 0;

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        n,
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        n,
        "form.updateField",
        json!({ "field": "rollNo", "value": "2" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        n,
        "form.updateField",
        json!({ "field": "obtained", "subjectId": 1, "value": "400" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        n,
        "form.updateField",
        json!({ "field": "maximum", "subjectId": 1, "value": "500" }),
    );
    let submitted = request_ok(&mut stdin, &mut reader, n, "form.submit", json!({}));
    assert_eq!(submitted["recordCount"], json!(2));

    drop(stdin);
    let _ = child.wait();

    // Reload sees both the legacy record and the new one, in order.
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let n = &mut 0;
    let selected = request_ok(
        &mut stdin,
        &mut reader,
        n,
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert_eq!(selected["recordCount"], json!(2));
    let listed = request_ok(&mut stdin, &mut reader, n, "results.list", json!({}));
    let records = listed["records"].as_array().expect("records");
    assert_eq!(records[0]["rollNo"], json!(1));
    assert_eq!(records[1]["rollNo"], json!(2));
    assert_eq!(records[1]["subjects"]["1"]["name"], json!("Subject 1"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
