// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! A scriptable [`CdpBackend`] for front-end tests. No browser, no sockets.
//!
//! Queued replies are consumed in order; once the queue is empty every call
//! returns `{}`. All received calls are recorded for assertions.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::broker::CdpBackend;
use crate::error::CdpError;

#[derive(Default)]
pub struct MockBackend {
    replies: Mutex<VecDeque<Result<Value, CdpError>>>,
    calls: Mutex<Vec<(String, Value)>>,
    open: AtomicBool,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply for the next call.
    pub fn push_result(&self, result: Value) {
        self.replies.lock().unwrap().push_back(Ok(result));
    }

    /// Queue a failure for the next call.
    pub fn push_error(&self, error: CdpError) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }

    /// Every `(method, params)` pair received so far, in call order.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CdpBackend for MockBackend {
    async fn invoke(&self, method: &str, params: Value) -> Result<Value, CdpError> {
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), params));
        match self.replies.lock().unwrap().pop_front() {
            Some(reply) => reply,
            None => Ok(json!({})),
        }
    }

    fn connection_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replies_are_consumed_in_order() {
        let mock = MockBackend::new();
        mock.push_result(json!({"n": 1}));
        mock.push_error(CdpError::Remote("boom".into()));

        assert_eq!(mock.invoke("A", json!({})).await.unwrap(), json!({"n": 1}));
        assert!(mock.invoke("B", json!({})).await.unwrap_err().is_remote());
        // Queue exhausted: default reply.
        assert_eq!(mock.invoke("C", json!({})).await.unwrap(), json!({}));
        assert_eq!(mock.calls().len(), 3);
    }
}
