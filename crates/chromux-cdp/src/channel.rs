// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The single control socket to the browser, and the correlation table that
//! multiplexes it.
//!
//! At most one WebSocket connection exists at a time. It lives in a slot
//! guarded by an async mutex; [`ControlChannel::send`] locks the slot, fills
//! it on demand, and writes the frame while still holding the lock. Callers
//! racing to connect therefore queue on the mutex and find the slot already
//! filled — at most one connect happens per outage.
//!
//! Each successful connect bumps a generation counter and spawns one reader
//! task; pending entries carry the generation they were written on. The
//! reader resolves entries by id; when its socket dies it clears the slot
//! (if its generation is still current) and fails exactly its own
//! generation's entries with [`CdpError::ConnectionClosed`] so no caller is
//! left hanging on a response that can never arrive.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace, warn};

use crate::error::CdpError;
use crate::launcher::Launcher;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type ReplySender = oneshot::Sender<Result<CommandReply, CdpError>>;
type PendingMap = HashMap<u64, Pending>;

/// The target type the relay attaches to. Other target kinds (service
/// workers, extensions, …) are not connectable page surfaces.
const PAGE_TARGET_KIND: &str = "page";

/// A completed round trip: at most one of `result` / `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandReply {
    pub result: Option<Value>,
    pub error: Option<RemoteError>,
}

/// Application-level error reported by the browser for one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteError {
    #[serde(default)]
    pub code: Option<i64>,
    pub message: String,
}

/// One entry of `GET /json/list`.
#[derive(Debug, Deserialize)]
struct TargetInfo {
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "webSocketDebuggerUrl", default)]
    ws_url: Option<String>,
}

/// Inbound frame from the browser: correlated reply or out-of-band event.
#[derive(Debug, Deserialize)]
struct InboundFrame {
    id: Option<u64>,
    result: Option<Value>,
    error: Option<RemoteError>,
}

#[derive(Serialize)]
struct OutboundFrame<'a> {
    id: u64,
    method: &'a str,
    params: &'a Value,
}

/// A request in flight: the allocated correlation id plus the receiver the
/// reader task will complete.
pub(crate) struct InFlight {
    pub(crate) id: u64,
    pub(crate) rx: oneshot::Receiver<Result<CommandReply, CdpError>>,
}

/// Correlation-table entry, tagged with the connection generation it was
/// written on so teardown can drain exactly its own requests.
struct Pending {
    generation: u64,
    tx: ReplySender,
}

struct Connection {
    sink: SplitSink<WsStream, Message>,
    generation: u64,
}

struct ChannelShared {
    launcher: Launcher,
    http: reqwest::Client,
    conn: Mutex<Option<Connection>>,
    open: AtomicBool,
    generation: AtomicU64,
    pending: StdMutex<PendingMap>,
    next_id: AtomicU64,
}

/// Owns the single browser connection. Cheap to clone; all clones share the
/// same connection slot, correlation table and id counter.
#[derive(Clone)]
pub struct ControlChannel {
    inner: Arc<ChannelShared>,
}

impl ControlChannel {
    pub fn new(launcher: Launcher) -> Self {
        Self {
            inner: Arc::new(ChannelShared {
                launcher,
                http: reqwest::Client::new(),
                conn: Mutex::new(None),
                open: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                pending: StdMutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Whether a connection is currently open. Racy by nature; used for
    /// health reporting only.
    pub fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::SeqCst)
    }

    /// Send `{id, method, params}` on the shared socket, connecting first if
    /// needed, and return the in-flight handle for this request.
    ///
    /// No timeout is applied here; the broker owns that policy.
    pub(crate) async fn send(&self, method: &str, params: &Value) -> Result<InFlight, CdpError> {
        let mut slot = self.inner.conn.lock().await;
        if slot.is_none() {
            *slot = Some(ChannelShared::open_connection(&self.inner).await?);
        }
        let Some(conn) = slot.as_mut() else {
            return Err(CdpError::Connect("connection slot empty".into()));
        };

        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = oneshot::channel();
        self.inner.pending.lock().unwrap().insert(
            id,
            Pending {
                generation: conn.generation,
                tx,
            },
        );

        let frame = serde_json::to_string(&OutboundFrame { id, method, params })
            .map_err(|e| CdpError::Connect(format!("serializing request: {e}")))?;
        trace!(id, method, "sending command");

        if let Err(e) = conn.sink.send(Message::Text(frame)).await {
            self.inner.pending.lock().unwrap().remove(&id);
            *slot = None;
            self.inner.open.store(false, Ordering::SeqCst);
            return Err(CdpError::Connect(e.to_string()));
        }

        Ok(InFlight { id, rx })
    }

    /// Drop the correlation entry for a request the broker gave up on.
    pub(crate) fn abandon(&self, id: u64) {
        self.inner.pending.lock().unwrap().remove(&id);
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use chromux_config::BrowserConfig;

    use super::*;

    /// Shared state as it looks while generation 2 is the live connection.
    fn shared_at_generation_two() -> Arc<ChannelShared> {
        Arc::new(ChannelShared {
            launcher: Launcher::new(&BrowserConfig::default()),
            http: reqwest::Client::new(),
            conn: Mutex::new(None),
            open: AtomicBool::new(true),
            generation: AtomicU64::new(2),
            pending: StdMutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        })
    }

    fn park(shared: &ChannelShared, id: u64, generation: u64) -> oneshot::Receiver<Result<CommandReply, CdpError>> {
        let (tx, rx) = oneshot::channel();
        shared
            .pending
            .lock()
            .unwrap()
            .insert(id, Pending { generation, tx });
        rx
    }

    #[tokio::test]
    async fn stale_reader_drains_only_its_own_generation() {
        let shared = shared_at_generation_two();
        let old_rx = park(&shared, 1, 1);
        let mut new_rx = park(&shared, 2, 2);

        // The generation-1 reader exits after generation 2 already opened.
        shared.on_closed(1).await;

        assert!(matches!(old_rx.await, Ok(Err(CdpError::ConnectionClosed))));
        // The live connection's entry is still parked and unresolved.
        assert!(shared.pending.lock().unwrap().contains_key(&2));
        assert!(new_rx.try_recv().is_err());
        assert!(shared.open.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn current_reader_close_drains_and_marks_closed() {
        let shared = shared_at_generation_two();
        let rx = park(&shared, 7, 2);

        shared.on_closed(2).await;

        assert!(matches!(rx.await, Ok(Err(CdpError::ConnectionClosed))));
        assert!(shared.pending.lock().unwrap().is_empty());
        assert!(!shared.open.load(Ordering::SeqCst));
    }
}

impl ChannelShared {
    /// Launch-if-needed, pick a page target, open the socket, spawn the
    /// reader for the new generation. Caller holds the connection slot lock.
    async fn open_connection(shared: &Arc<Self>) -> Result<Connection, CdpError> {
        shared.launcher.ensure_reachable().await?;

        let targets: Vec<TargetInfo> = shared
            .http
            .get(format!("{}/json/list", shared.launcher.endpoint()))
            .send()
            .await
            .map_err(|e| CdpError::Connect(format!("listing targets: {e}")))?
            .json()
            .await
            .map_err(|e| CdpError::Connect(format!("parsing target list: {e}")))?;

        let page = targets
            .into_iter()
            .find(|t| t.kind == PAGE_TARGET_KIND)
            .ok_or(CdpError::NoTarget)?;
        let ws_url = page.ws_url.ok_or(CdpError::NoTarget)?;

        let (stream, _response) = connect_async(&ws_url)
            .await
            .map_err(|e| CdpError::Connect(e.to_string()))?;
        debug!(url = %ws_url, "control socket open");

        let (sink, source) = stream.split();
        let generation = shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        shared.open.store(true, Ordering::SeqCst);
        tokio::spawn(Self::read_loop(Arc::clone(shared), source, generation));

        Ok(Connection { sink, generation })
    }

    /// Runs for the lifetime of one connection generation, resolving pending
    /// entries in transport arrival order.
    async fn read_loop(shared: Arc<Self>, mut source: SplitStream<WsStream>, generation: u64) {
        while let Some(msg) = source.next().await {
            let text = match msg {
                Ok(Message::Text(t)) => t,
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    debug!("control socket read error: {e}");
                    break;
                }
            };

            let frame: InboundFrame = match serde_json::from_str(&text) {
                Ok(f) => f,
                Err(e) => {
                    warn!("unparseable frame from browser: {e}");
                    continue;
                }
            };

            let entry = frame
                .id
                .and_then(|id| shared.pending.lock().unwrap().remove(&id));
            match entry {
                Some(entry) => {
                    let _ = entry.tx.send(Ok(CommandReply {
                        result: frame.result,
                        error: frame.error,
                    }));
                }
                // Events and replies to abandoned requests.
                None => trace!(id = ?frame.id, "dropping unmatched frame"),
            }
        }

        shared.on_closed(generation).await;
    }

    /// Tear down after a socket loss: clear the slot (unless a newer
    /// generation already replaced it) and fail this generation's pending
    /// entries so no caller waits forever. Entries written on a newer
    /// connection stay untouched.
    async fn on_closed(&self, generation: u64) {
        {
            let mut slot = self.conn.lock().await;
            if self.generation.load(Ordering::SeqCst) == generation {
                *slot = None;
                self.open.store(false, Ordering::SeqCst);
            }
        }

        let orphaned: Vec<ReplySender> = {
            let mut pending = self.pending.lock().unwrap();
            let drained: Vec<(u64, Pending)> = pending.drain().collect();
            let mut orphaned = Vec::new();
            for (id, entry) in drained {
                if entry.generation == generation {
                    orphaned.push(entry.tx);
                } else {
                    pending.insert(id, entry);
                }
            }
            orphaned
        };
        if !orphaned.is_empty() {
            debug!(count = orphaned.len(), "failing requests orphaned by connection loss");
        }
        for tx in orphaned {
            let _ = tx.send(Err(CdpError::ConnectionClosed));
        }
    }
}
