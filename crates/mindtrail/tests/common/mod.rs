#![allow(dead_code)]

use mindtrail_store::{FileStore, Frame, MemoryStore, TimelineOptions};
use std::io::Write;
use std::path::Path;
use std::process::{Child, Command, Output, Stdio};

pub fn bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_mindtrail"));
    cmd.env_remove("OPENCODE")
        .env_remove("CLAUDECODE")
        .env_remove("MINDTRAIL_DEBUG")
        .env_remove("MINDTRAIL_DIR")
        .env_remove("RUST_LOG");
    cmd
}

/// Start a hook process in `dir` and feed it `payload` on stdin
pub fn spawn_hook(dir: &Path, hook: &str, payload: &serde_json::Value) -> Child {
    let mut child = bin()
        .arg(hook)
        .current_dir(dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn mindtrail");
    let mut stdin = child.stdin.take().expect("stdin is piped");
    stdin
        .write_all(payload.to_string().as_bytes())
        .expect("failed to write hook payload");
    drop(stdin);
    child
}

pub fn run_hook(dir: &Path, hook: &str, payload: &serde_json::Value) -> Output {
    spawn_hook(dir, hook, payload)
        .wait_with_output()
        .expect("hook did not finish")
}

pub fn run_query(dir: &Path, args: &[&str]) -> serde_json::Value {
    let output = bin()
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to run mindtrail");
    assert!(output.status.success(), "{:?}", output);
    serde_json::from_slice(&output.stdout).expect("query output is JSON")
}

pub fn tool_event(
    session: &str,
    tool: &str,
    input: serde_json::Value,
    response: serde_json::Value,
) -> serde_json::Value {
    serde_json::json!({
        "session_id": session,
        "tool_name": tool,
        "tool_input": input,
        "tool_response": response,
    })
}

pub fn stored_frames(dir: &Path) -> Vec<Frame> {
    let path = dir.join(".mindtrail").join("memory.mtl");
    if !path.exists() {
        return Vec::new();
    }
    FileStore::open_or_create(&path)
        .unwrap()
        .timeline(TimelineOptions {
            limit: usize::MAX,
            reverse: false,
        })
        .unwrap()
}
