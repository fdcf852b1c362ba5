// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Synchronous HTTP front-end: one CDP call per request/response pair.
//!
//! - `POST /cdp` `{"method": ..., "params": ...}` → the raw CDP result.
//! - `GET /health` → `{"ok": true, "connectionOpen": bool}`.
//!
//! Browser-reported errors map to 400, everything else (launch failures,
//! timeouts, lost connections, bad request bodies) to 500. The status split
//! follows [`CdpError::is_remote`]: only the browser itself can say a request
//! was the client's fault.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tracing::{debug, info};

use chromux_cdp::{CdpBackend, CdpError};

type Backend = Arc<dyn CdpBackend>;

pub fn router(backend: Backend) -> Router {
    Router::new()
        .route("/cdp", post(cdp))
        .route("/health", get(health))
        .fallback(not_found)
        .with_state(backend)
}

/// Bind and serve until the listener fails.
pub async fn serve(addr: SocketAddr, backend: Backend) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP API listening");
    axum::serve(listener, router(backend)).await?;
    Ok(())
}

async fn cdp(State(backend): State<Backend>, body: Bytes) -> Response {
    // Parsed by hand rather than via the Json extractor so a malformed body
    // lands in the same error shape as every other failure.
    let parsed: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    };
    let Some(method) = parsed.get("method").and_then(Value::as_str) else {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "missing \"method\"");
    };
    let params = parsed.get("params").cloned().unwrap_or_else(|| json!({}));

    debug!(method, "HTTP CDP request");
    match backend.invoke(method, params).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(err) if err.is_remote() => {
            error_response(StatusCode::BAD_REQUEST, &err.to_string())
        }
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
    }
}

async fn health(State(backend): State<Backend>) -> Json<Value> {
    Json(json!({"ok": true, "connectionOpen": backend.connection_open()}))
}

async fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({"error": message}))).into_response()
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
