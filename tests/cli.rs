use std::fs;
use std::process::Command;
use tempfile::TempDir;

fn move_chat() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_move-chat"));
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_json_error_goes_to_stderr() {
    let tmp = TempDir::new().unwrap();

    let output = move_chat()
        .args(["--json", "--list", "/work/missing"])
        .env("CLAUDE_PROJECTS_DIR", tmp.path())
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    let error: serde_json::Value = serde_json::from_str(stderr.lines().last().unwrap()).unwrap();
    assert!(error["error"].as_str().unwrap().contains("Not found"));
}

#[test]
fn test_projects_dir_from_env() {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path().join("-work-demo");
    fs::create_dir(&project).unwrap();
    fs::write(
        project.join("abc.jsonl"),
        "{\"message\":{\"role\":\"user\",\"content\":\"Hello there\"}}\n",
    )
    .unwrap();

    let output = move_chat()
        .args(["--list", "/work/demo"])
        .env("CLAUDE_PROJECTS_DIR", tmp.path())
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("abc|Hello there|"));
}

#[test]
fn test_missing_session_exits_nonzero() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir(tmp.path().join("-work-a")).unwrap();

    let output = move_chat()
        .args(["nope", "--from", "/work/a", "--to", "/work/b"])
        .env("CLAUDE_PROJECTS_DIR", tmp.path())
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Not found"));
    assert!(!tmp.path().join("-work-b").exists());
}
