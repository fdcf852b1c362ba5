// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The single entry point both front-ends use to issue CDP calls.
//!
//! The broker adds the policy the channel deliberately leaves out: a bounded
//! per-request timeout. A browser that never answers costs the caller
//! `request_timeout` and one correlation-table entry, not an eternal hang.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::channel::ControlChannel;
use crate::error::CdpError;

/// What the front-ends see of the relay core.
///
/// Production wires in [`CdpBroker`]; tests inject [`crate::MockBackend`].
#[async_trait]
pub trait CdpBackend: Send + Sync {
    /// Issue one `(method, params)` call and await its result.
    async fn invoke(&self, method: &str, params: Value) -> Result<Value, CdpError>;

    /// Whether the control socket is currently open (health reporting).
    fn connection_open(&self) -> bool;
}

pub struct CdpBroker {
    channel: ControlChannel,
    request_timeout: Duration,
}

impl CdpBroker {
    pub fn new(channel: ControlChannel, request_timeout: Duration) -> Self {
        Self {
            channel,
            request_timeout,
        }
    }
}

#[async_trait]
impl CdpBackend for CdpBroker {
    async fn invoke(&self, method: &str, params: Value) -> Result<Value, CdpError> {
        let in_flight = self.channel.send(method, &params).await?;

        let reply = match tokio::time::timeout(self.request_timeout, in_flight.rx).await {
            Ok(Ok(reply)) => reply?,
            // The reader task dropped the sender without resolving it; only
            // possible if the task itself died, so treat it as a lost socket.
            Ok(Err(_)) => return Err(CdpError::ConnectionClosed),
            Err(_) => {
                self.channel.abandon(in_flight.id);
                return Err(CdpError::Timeout);
            }
        };

        if let Some(err) = reply.error {
            return Err(CdpError::Remote(err.message));
        }
        Ok(reply.result.unwrap_or(Value::Null))
    }

    fn connection_open(&self) -> bool {
        self.channel.is_open()
    }
}
