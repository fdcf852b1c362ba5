// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! `chromux-cdp` — the connection and multiplexing core of the relay.
//!
//! Maintains exactly one live WebSocket to a browser's page-level debug
//! socket, correlates request/response pairs over it by integer id, and
//! launches the browser lazily when nothing answers the debug endpoint.
//!
//! ```text
//! HTTP front-end ──┐
//!                  ├──► CdpBroker::invoke(method, params)
//! MCP front-end ───┘         │
//!                            ▼
//!                   ControlChannel::send
//!                      │  lock connection slot (connects on demand:
//!                      │  Launcher::ensure_reachable → /json/list →
//!                      │  first "page" target → WebSocket)
//!                      │  allocate id, park oneshot in pending table
//!                      ▼
//!                   browser debug socket ──► reader task resolves the
//!                                            pending entry by id
//! ```
//!
//! Front-ends depend only on the [`CdpBackend`] trait so tests can inject a
//! [`MockBackend`] instead of a live browser.

mod broker;
mod channel;
mod error;
mod launcher;
pub mod mock;

pub use broker::{CdpBackend, CdpBroker};
pub use channel::{CommandReply, ControlChannel, RemoteError};
pub use error::CdpError;
pub use launcher::Launcher;
pub use mock::MockBackend;
