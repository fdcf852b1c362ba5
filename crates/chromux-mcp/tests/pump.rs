// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Drives the message pump end to end over an in-memory duplex pipe, the way
//! production drives it over stdin/stdout.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use chromux_cdp::MockBackend;
use chromux_mcp::McpServer;

struct Client {
    write: tokio::io::WriteHalf<tokio::io::DuplexStream>,
    lines: tokio::io::Lines<BufReader<tokio::io::ReadHalf<tokio::io::DuplexStream>>>,
    pump: tokio::task::JoinHandle<anyhow::Result<()>>,
}

impl Client {
    fn start(mock: Arc<MockBackend>) -> Self {
        let (client, server) = tokio::io::duplex(4096);
        let (server_read, server_write) = tokio::io::split(server);
        let pump = tokio::spawn(async move {
            McpServer::new(mock)
                .run(BufReader::new(server_read), server_write)
                .await
        });
        let (client_read, client_write) = tokio::io::split(client);
        Self {
            write: client_write,
            lines: BufReader::new(client_read).lines(),
            pump,
        }
    }

    async fn send_line(&mut self, line: &str) {
        self.write.write_all(line.as_bytes()).await.unwrap();
        self.write.write_all(b"\n").await.unwrap();
    }

    async fn recv(&mut self) -> Value {
        let line = self.lines.next_line().await.unwrap().unwrap();
        serde_json::from_str(&line).unwrap()
    }
}

#[tokio::test]
async fn full_session_over_the_pipe() {
    let mock = Arc::new(MockBackend::new());
    mock.push_result(json!({"result": {"value": 4}}));
    let mut client = Client::start(mock.clone());

    client
        .send_line(r#"{"jsonrpc": "2.0", "id": 1, "method": "initialize"}"#)
        .await;
    let reply = client.recv().await;
    assert_eq!(reply["id"], 1);
    assert_eq!(reply["result"]["protocolVersion"], "2024-11-05");

    // Notification: no reply, the next response belongs to tools/list.
    client
        .send_line(r#"{"jsonrpc": "2.0", "method": "notifications/initialized"}"#)
        .await;
    client
        .send_line(r#"{"jsonrpc": "2.0", "id": 2, "method": "tools/list"}"#)
        .await;
    let reply = client.recv().await;
    assert_eq!(reply["id"], 2);
    assert_eq!(reply["result"]["tools"][0]["name"], "cdp_send");

    client
        .send_line(
            r#"{"jsonrpc": "2.0", "id": 3, "method": "tools/call", "params": {"name": "cdp_send", "arguments": {"method": "Runtime.evaluate", "params": {"expression": "2+2"}}}}"#,
        )
        .await;
    let reply = client.recv().await;
    assert_eq!(reply["id"], 3);
    let text = reply["result"]["content"][0]["text"].as_str().unwrap();
    let parsed: Value = serde_json::from_str(text).unwrap();
    assert_eq!(parsed["result"]["value"], 4);

    assert_eq!(mock.calls().len(), 1);
}

#[tokio::test]
async fn malformed_and_blank_lines_do_not_kill_the_pump() {
    let mut client = Client::start(Arc::new(MockBackend::new()));

    client.send_line("this is not json").await;
    client.send_line("").await;
    client
        .send_line(r#"{"jsonrpc": "2.0", "id": 7, "method": "tools/list"}"#)
        .await;

    // The garbage lines produce no output; the first reply is for id 7.
    let reply = client.recv().await;
    assert_eq!(reply["id"], 7);
    assert!(reply["result"]["tools"].is_array());
}

#[tokio::test]
async fn responses_come_back_in_request_order() {
    let mock = Arc::new(MockBackend::new());
    mock.push_result(json!({"first": true}));
    mock.push_result(json!({"second": true}));
    let mut client = Client::start(mock);

    for (id, expr) in [(10, "1"), (11, "2")] {
        client
            .send_line(&format!(
                r#"{{"jsonrpc": "2.0", "id": {id}, "method": "tools/call", "params": {{"name": "cdp_send", "arguments": {{"method": "Runtime.evaluate", "params": {{"expression": "{expr}"}}}}}}}}"#,
            ))
            .await;
    }

    assert_eq!(client.recv().await["id"], 10);
    assert_eq!(client.recv().await["id"], 11);
}

#[tokio::test]
async fn eof_ends_the_pump_cleanly() {
    let mut client = Client::start(Arc::new(MockBackend::new()));
    client
        .send_line(r#"{"jsonrpc": "2.0", "id": 1, "method": "initialize"}"#)
        .await;
    client.recv().await;

    // Dropping a generic `WriteHalf` alone does not close the duplex (the
    // read half keeps it alive), so shut the write side down explicitly to
    // deliver EOF to the server.
    client.write.shutdown().await.unwrap();
    drop(client.write);
    client.pump.await.unwrap().unwrap();
}
