// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! MCP-shaped front-end: newline-delimited JSON-RPC 2.0, one message per
//! line, processed strictly in arrival order. In production the pump runs on
//! stdin/stdout (which is why everything else logs to stderr); tests drive it
//! through an in-memory duplex pipe.
//!
//! The server exposes a single tool, `cdp_send`, which forwards an arbitrary
//! CDP command to the browser and returns the result as text content.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use chromux_cdp::CdpBackend;

const PROTOCOL_VERSION: &str = "2024-11-05";
const TOOL_NAME: &str = "cdp_send";

pub struct McpServer {
    backend: Arc<dyn CdpBackend>,
}

impl McpServer {
    pub fn new(backend: Arc<dyn CdpBackend>) -> Self {
        Self { backend }
    }

    /// Pump messages until EOF. Each request is fully handled before the next
    /// line is read, so responses leave in request order.
    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let request: Value = match serde_json::from_str(line) {
                Ok(v) => v,
                Err(e) => {
                    warn!("skipping malformed message: {e}");
                    continue;
                }
            };
            if let Some(reply) = self.handle_request(request).await {
                let mut out = serde_json::to_vec(&reply)?;
                out.push(b'\n');
                writer.write_all(&out).await?;
                writer.flush().await?;
            }
        }
        debug!("input closed, stopping message pump");
        Ok(())
    }

    /// Dispatch one request. Notifications produce no reply.
    pub async fn handle_request(&self, request: Value) -> Option<Value> {
        let id = request.get("id").cloned().unwrap_or(Value::Null);
        let method = request
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or_default();
        debug!(method, "handling message");

        match method {
            "initialize" => Some(result_reply(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {"tools": {}},
                    "serverInfo": {
                        "name": "chromux",
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                }),
            )),
            "notifications/initialized" => None,
            "tools/list" => Some(result_reply(id, tool_catalog())),
            "tools/call" => {
                let params = request.get("params").cloned().unwrap_or_else(|| json!({}));
                Some(self.handle_tool_call(id, params).await)
            }
            other => Some(error_reply(id, -32601, &format!("Unknown method: {other}"))),
        }
    }

    async fn handle_tool_call(&self, id: Value, params: Value) -> Value {
        let name = params.get("name").and_then(Value::as_str).unwrap_or_default();
        if name != TOOL_NAME {
            return tool_text(id, format!("Unknown tool: {name}"), true);
        }

        let args = params
            .get("arguments")
            .cloned()
            .unwrap_or_else(|| json!({}));
        let Some(method) = args.get("method").and_then(Value::as_str) else {
            return tool_text(id, "Error: missing required argument \"method\"".into(), true);
        };
        let cdp_params = args.get("params").cloned().unwrap_or_else(|| json!({}));

        let result = match self.backend.invoke(method, cdp_params).await {
            Ok(result) => result,
            Err(e) if e.is_remote() => return tool_text(id, format!("CDP Error: {e}"), true),
            Err(e) => return tool_text(id, format!("Error: {e}"), true),
        };

        let pretty =
            serde_json::to_string_pretty(&result).unwrap_or_else(|_| result.to_string());
        match args.get("outputFile").and_then(Value::as_str) {
            Some(path) => match tokio::fs::write(path, &pretty).await {
                Ok(()) => tool_text(id, format!("Written to: {path}"), false),
                Err(e) => tool_text(id, format!("Error: {e}"), true),
            },
            None => tool_text(id, pretty, false),
        }
    }
}

/// The fixed tool catalog; identical on every `tools/list`.
fn tool_catalog() -> Value {
    json!({
        "tools": [{
            "name": TOOL_NAME,
            "description": "Send a raw Chrome DevTools Protocol command to the connected page",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "method": {
                        "type": "string",
                        "description": "CDP method name, e.g. Runtime.evaluate",
                    },
                    "params": {
                        "type": "object",
                        "description": "Parameters for the CDP method",
                    },
                    "outputFile": {
                        "type": "string",
                        "description": "Write the result to this file instead of returning it inline",
                    },
                },
                "required": ["method"],
            },
        }]
    })
}

fn result_reply(id: Value, result: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "result": result})
}

fn error_reply(id: Value, code: i64, message: &str) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": message}})
}

/// Tool results are text content; failures are marked rather than raised so
/// the protocol stays in the `result` channel.
fn tool_text(id: Value, text: String, is_error: bool) -> Value {
    let mut result = json!({"content": [{"type": "text", "text": text}]});
    if is_error {
        result["isError"] = json!(true);
    }
    result_reply(id, result)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
