//! Request/response correlation on a raw [`AcpClient`].

use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use acp_host::acp::client::AcpClient;
use acp_host::acp::codec::MAX_LINE_BYTES;
use acp_host::acp::AgentEvent;
use acp_host::AppError;

use super::test_helpers::STEP;

struct Wire {
    lines: tokio::io::Lines<BufReader<tokio::io::ReadHalf<tokio::io::DuplexStream>>>,
    writer: tokio::io::WriteHalf<tokio::io::DuplexStream>,
}

impl Wire {
    async fn recv(&mut self) -> Value {
        let line = tokio::time::timeout(STEP, self.lines.next_line())
            .await
            .expect("timely")
            .expect("read")
            .expect("open");
        serde_json::from_str(&line).unwrap()
    }

    async fn send_line(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
    }
}

fn connect() -> (AcpClient, tokio::sync::mpsc::Receiver<AgentEvent>, Wire) {
    let (host, agent) = tokio::io::duplex(64 * 1024);
    let (host_read, host_write) = tokio::io::split(host);
    let (agent_read, agent_write) = tokio::io::split(agent);
    let (client, events) = AcpClient::connect("wire", host_read, host_write, STEP);
    let wire = Wire {
        lines: BufReader::new(agent_read).lines(),
        writer: agent_write,
    };
    (client, events, wire)
}

#[tokio::test]
async fn out_of_order_replies_reach_their_callers() {
    let (client, _events, mut wire) = connect();

    let first_params = json!({"n": 1});
    let first = client.request::<_, Value>("echo", &first_params);
    let second_params = json!({"n": 2});
    let second = client.request::<_, Value>("echo", &second_params);
    let agent = async {
        let a = wire.recv().await;
        let b = wire.recv().await;
        assert_ne!(a["id"], b["id"], "ids are unique");
        // Answer in reverse order.
        for msg in [&b, &a] {
            let reply = json!({"jsonrpc": "2.0", "id": msg["id"], "result": {"n": msg["params"]["n"]}});
            wire.send_line(&reply.to_string()).await;
        }
    };

    let (first, second, ()) = tokio::join!(first, second, agent);
    assert_eq!(first.unwrap(), json!({"n": 1}));
    assert_eq!(second.unwrap(), json!({"n": 2}));
}

#[tokio::test]
async fn unsolicited_response_is_ignored() {
    let (client, _events, mut wire) = connect();

    let call_params = json!({});
    let call = client.request::<_, Value>("ping", &call_params);
    let agent = async {
        let msg = wire.recv().await;
        wire.send_line(r#"{"jsonrpc":"2.0","id":999,"result":"stray"}"#)
            .await;
        wire.send_line(&json!({"jsonrpc": "2.0", "id": msg["id"], "result": "pong"}).to_string())
            .await;
    };

    let (reply, ()) = tokio::join!(call, agent);
    assert_eq!(reply.unwrap(), json!("pong"));
}

/// An oversize line and a garbage line are skipped; the stream keeps going.
#[tokio::test]
async fn oversize_and_garbage_lines_are_skipped() {
    let (client, _events, mut wire) = connect();

    let call_params = json!({});
    let call = client.request::<_, Value>("ping", &call_params);
    let agent = async {
        let msg = wire.recv().await;
        let huge = format!(r#"{{"jsonrpc":"2.0","method":"x","params":"{}"}}"#, "a".repeat(MAX_LINE_BYTES + 16));
        wire.send_line(&huge).await;
        wire.send_line("this is not json").await;
        wire.send_line(&json!({"jsonrpc": "2.0", "id": msg["id"], "result": "pong"}).to_string())
            .await;
    };

    let (reply, ()) = tokio::join!(call, agent);
    assert_eq!(reply.unwrap(), json!("pong"));
}

/// A line of invalid UTF-8 neither fails pending calls nor closes the session.
#[tokio::test]
async fn invalid_utf8_line_is_skipped() {
    let (client, mut events, mut wire) = connect();

    let call_params = json!({});
    let call = client.request::<_, Value>("ping", &call_params);
    let agent = async {
        let msg = wire.recv().await;
        wire.writer.write_all(b"\xff stray byte\n").await.unwrap();
        wire.send_line(&json!({"jsonrpc": "2.0", "id": msg["id"], "result": "pong"}).to_string())
            .await;
    };

    let (reply, ()) = tokio::join!(call, agent);
    assert_eq!(reply.unwrap(), json!("pong"));
    assert!(
        tokio::time::timeout(Duration::from_millis(100), events.recv())
            .await
            .is_err(),
        "no event expected after a skipped line"
    );
}

#[tokio::test]
async fn agent_requests_and_notifications_become_events() {
    let (client, mut events, mut wire) = connect();

    wire.send_line(r#"{"jsonrpc":"2.0","id":"q1","method":"fs/read_text_file","params":{"path":"/x"}}"#)
        .await;
    wire.send_line(r#"{"jsonrpc":"2.0","method":"session/update","params":{}}"#)
        .await;

    let request = tokio::time::timeout(STEP, events.recv()).await.unwrap().unwrap();
    let AgentEvent::Request { id, method, .. } = request else {
        panic!("expected request, got {request:?}");
    };
    assert_eq!(method, "fs/read_text_file");
    let notification = tokio::time::timeout(STEP, events.recv()).await.unwrap().unwrap();
    assert!(matches!(notification, AgentEvent::Notification { ref method, .. } if method == "session/update"));

    client.respond(&id, Ok(json!({"content": ""}))).await.unwrap();
    let reply = wire.recv().await;
    assert_eq!(reply, json!({"jsonrpc": "2.0", "id": "q1", "result": {"content": ""}}));

    client
        .respond(
            &id,
            Err(AppError::Rpc {
                code: -32_601,
                message: "method not found: x".into(),
            }),
        )
        .await
        .unwrap();
    let reply = wire.recv().await;
    assert_eq!(reply["error"], json!({"code": -32601, "message": "method not found: x"}));
}

#[tokio::test]
async fn pending_requests_fail_when_the_agent_goes_away() {
    let (client, mut events, mut wire) = connect();

    let call_params = json!({});
    let call = client.request::<_, Value>("session/prompt", &call_params);
    let agent = async move {
        let _ = wire.recv().await;
        drop(wire);
    };

    let (reply, ()) = tokio::join!(call, agent);
    let err = reply.expect_err("connection closed");
    assert!(matches!(&err, AppError::Transport(msg) if msg.contains("closed")), "got {err:?}");

    let closed = tokio::time::timeout(STEP, events.recv()).await.unwrap().unwrap();
    assert!(matches!(closed, AgentEvent::Closed { exit_code: None, .. }));
}

#[tokio::test]
async fn shutdown_rejects_new_requests() {
    let (client, _events, _wire) = connect();
    client.shutdown();
    assert!(client.is_shut_down());

    // Let the writer observe cancellation and drop its receiver.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let err = client
        .request::<_, Value>("ping", &json!({}))
        .await
        .expect_err("writer stopped");
    assert!(matches!(err, AppError::Transport(_)), "got {err:?}");
}
