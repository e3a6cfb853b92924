use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_project_dir(prefix: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    dir.push(format!("routecss_{prefix}_{nanos}"));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn routecss(dir: &PathBuf) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_routecss"));
    cmd.current_dir(dir).env_remove("ROUTECSS_LOG");
    cmd
}

#[test]
fn check_reports_route_count() {
    let dir = temp_project_dir("check_ok");
    fs::write(
        dir.join("api.css"),
        "route[path=\"/a\"] { return: json(1); }\nroute[method=\"POST\"][path=\"/b\"] { return: json(2); }\n",
    )
    .expect("write api.css");

    let output = routecss(&dir)
        .arg("check")
        .arg("api.css")
        .output()
        .expect("run routecss check");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "ok: 2 route(s)");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn check_fails_on_error_diagnostics() {
    let dir = temp_project_dir("check_err");
    fs::write(dir.join("api.css"), "route[path=\"/a\"] {\n  --x: 1;\n}\n").expect("write api.css");

    let output = routecss(&dir)
        .arg("check")
        .arg("api.css")
        .output()
        .expect("run routecss check");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("error: route GET /a has no return declaration (line 1)"),
        "stderr: {stderr}"
    );

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn check_uses_manifest_entry_and_dumps_routes() {
    let dir = temp_project_dir("check_manifest");
    fs::write(
        dir.join("routecss.toml"),
        "[package]\nentry = \"src/api.css\"\n",
    )
    .expect("write manifest");
    fs::create_dir_all(dir.join("src")).expect("create src");
    fs::write(
        dir.join("src/api.css"),
        r#"
@database "sqlite::memory:";
route[method="GET"][path="/users/:id"] {
  --id: param(:id);
  --user: sql("SELECT * FROM users WHERE id = ?", var(--id));
  status: if(--user: 200; else: 404);
  return: json(var(--user));
}
"#,
    )
    .expect("write api.css");

    let output = routecss(&dir)
        .arg("check")
        .arg("--manifest-path")
        .arg(&dir)
        .arg("--dump")
        .output()
        .expect("run routecss check --dump");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(
        lines,
        vec![
            "@database sqlite::memory:",
            "GET /users/:id status=if(...) return=json vars=[--id, --user]",
        ]
    );

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn missing_entry_is_reported() {
    let dir = temp_project_dir("no_entry");
    fs::write(dir.join("routecss.toml"), "[serve]\nport = 4000\n").expect("write manifest");

    let output = routecss(&dir).arg("check").output().expect("run routecss check");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("missing entry"), "stderr: {stderr}");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn invalid_manifest_is_reported() {
    let dir = temp_project_dir("bad_manifest");
    fs::write(dir.join("routecss.toml"), "[serve]\nport = \"not a port\"\n").expect("write manifest");
    fs::write(dir.join("api.css"), "route[path=\"/\"] { return: json(1); }\n").expect("write api.css");

    let output = routecss(&dir)
        .arg("check")
        .arg("api.css")
        .output()
        .expect("run routecss check");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid manifest"), "stderr: {stderr}");

    let _ = fs::remove_dir_all(&dir);
}
