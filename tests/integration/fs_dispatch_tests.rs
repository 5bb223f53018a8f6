//! Agent → host file requests served through a live session.

use std::path::Path;

use serde_json::{json, Value};

use acp_host::errors::{INVALID_PARAMS, METHOD_NOT_FOUND, RESOURCE_NOT_FOUND};
use acp_host::fs_delegate::FsDelegate;

use super::test_helpers::{establish, options, options_with, pair, FakeAgent, SESSION_ID, STEP};

fn ten_lines(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("notes.txt");
    let body: String = (1..=10).map(|i| format!("line {i}\n")).collect();
    std::fs::write(&path, body).unwrap();
    path
}

async fn call(agent: &mut FakeAgent, id: i64, method: &str, params: Value) -> Value {
    agent.request(json!(id), method, params).await;
    agent.response_to(&json!(id)).await
}

fn error_code(response: &Value) -> i64 {
    response["error"]["code"].as_i64().expect("error response")
}

// ── Read ─────────────────────────────────────────────────────

#[tokio::test]
async fn read_returns_requested_window() {
    let dir = tempfile::tempdir().unwrap();
    let path = ten_lines(dir.path());
    let (session, _events, mut agent) = pair(options(dir.path()));
    establish(&session, &mut agent, json!({})).await;

    let response = call(
        &mut agent,
        100,
        "fs/read_text_file",
        json!({"sessionId": SESSION_ID, "path": path, "line": 3, "limit": 4}),
    )
    .await;

    assert_eq!(response["jsonrpc"], "2.0");
    assert_eq!(
        response["result"],
        json!({"content": "line 3\nline 4\nline 5\nline 6\n", "totalLines": 10})
    );
}

#[tokio::test]
async fn missing_file_is_resource_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let (session, _events, mut agent) = pair(options(dir.path()));
    establish(&session, &mut agent, json!({})).await;

    let response = call(
        &mut agent,
        101,
        "fs/read_text_file",
        json!({"sessionId": SESSION_ID, "path": dir.path().join("absent.txt")}),
    )
    .await;

    assert_eq!(error_code(&response), RESOURCE_NOT_FOUND);
    assert!(response["error"]["message"]
        .as_str()
        .unwrap()
        .contains("not found"));
}

// ── Write ────────────────────────────────────────────────────

#[tokio::test]
async fn write_creates_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let (session, _events, mut agent) = pair(options(dir.path()));
    establish(&session, &mut agent, json!({})).await;
    let target = dir.path().join("out/deep/result.md");

    let response = call(
        &mut agent,
        102,
        "fs/write_text_file",
        json!({"sessionId": SESSION_ID, "path": target, "content": "# Done\n"}),
    )
    .await;

    assert_eq!(response["result"], json!({}));
    assert_eq!(std::fs::read_to_string(&target).unwrap(), "# Done\n");
}

// ── Rejections ───────────────────────────────────────────────

#[tokio::test]
async fn unknown_method_is_method_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let (session, _events, mut agent) = pair(options(dir.path()));
    establish(&session, &mut agent, json!({})).await;

    let response = call(
        &mut agent,
        103,
        "terminal/create",
        json!({"sessionId": SESSION_ID, "command": "ls"}),
    )
    .await;

    assert_eq!(error_code(&response), METHOD_NOT_FOUND);
    assert_eq!(
        response["error"]["message"],
        "method not found: terminal/create"
    );
}

#[tokio::test]
async fn malformed_params_are_invalid_params() {
    let dir = tempfile::tempdir().unwrap();
    let (session, _events, mut agent) = pair(options(dir.path()));
    establish(&session, &mut agent, json!({})).await;

    let response = call(
        &mut agent,
        104,
        "fs/write_text_file",
        json!({"sessionId": SESSION_ID, "path": "/tmp/x"}),
    )
    .await;
    assert_eq!(error_code(&response), INVALID_PARAMS);
}

#[tokio::test]
async fn foreign_session_id_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = ten_lines(dir.path());
    let (session, _events, mut agent) = pair(options(dir.path()));
    establish(&session, &mut agent, json!({})).await;

    let response = call(
        &mut agent,
        105,
        "fs/read_text_file",
        json!({"sessionId": "someone-else", "path": path}),
    )
    .await;
    assert_eq!(error_code(&response), INVALID_PARAMS);
    assert_eq!(response["error"]["message"], "unknown session: someone-else");
}

#[tokio::test]
async fn scoped_delegate_refuses_paths_outside_workspace() {
    let dir = tempfile::tempdir().unwrap();
    let outside = tempfile::tempdir().unwrap();
    let secret = ten_lines(outside.path());
    let root = dir.path().canonicalize().unwrap();
    let (session, _events, mut agent) =
        pair(options_with(&root, FsDelegate::scoped(&root), STEP));
    establish(&session, &mut agent, json!({})).await;

    let response = call(
        &mut agent,
        106,
        "fs/read_text_file",
        json!({"sessionId": SESSION_ID, "path": secret}),
    )
    .await;
    assert_eq!(error_code(&response), INVALID_PARAMS);

    let inside = call(
        &mut agent,
        107,
        "fs/write_text_file",
        json!({"sessionId": SESSION_ID, "path": root.join("ok.txt"), "content": "ok"}),
    )
    .await;
    assert_eq!(inside["result"], json!({}));
}

/// String ids are echoed back unchanged.
#[tokio::test]
async fn string_request_id_is_echoed() {
    let dir = tempfile::tempdir().unwrap();
    let path = ten_lines(dir.path());
    let (session, _events, mut agent) = pair(options(dir.path()));
    establish(&session, &mut agent, json!({})).await;

    agent
        .request(
            json!("read-1"),
            "fs/read_text_file",
            json!({"sessionId": SESSION_ID, "path": path, "limit": 1}),
        )
        .await;
    let response = agent.response_to(&json!("read-1")).await;
    assert_eq!(response["result"]["content"], "line 1\n");
}
