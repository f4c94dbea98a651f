//! Client registry, broadcast fan-out, keepalive and per-operation streaming.
//!
//! ```text
//!  broadcast() ──try_send──► [bounded queue] ──► fan-out task ──try_send──► client buffers
//!  stream_operation() ─────────────────────────────────────────try_send──► one client buffer
//!  keepalive task (one per client) ────────────────────────────try_send──► its client buffer
//! ```
//!
//! Every write to a client is a non-blocking channel send. The registry lock is
//! never held across an await other than acquiring the lock itself, and the
//! fan-out task removes failed clients only after its read lock is released.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{Instrument, debug, info, info_span, warn};

use contentmcp_shared::{ContentMcpError, Result, StreamConfig};

use crate::event::{ClientId, OperationKind, Phase, StreamEvent};

// ---------------------------------------------------------------------------
// Client state
// ---------------------------------------------------------------------------

struct ClientHandle {
    id: ClientId,
    sender: mpsc::Sender<StreamEvent>,
    last_seen_ms: AtomicI64,
    /// Raised exactly once when the client leaves the registry.
    done: watch::Sender<bool>,
}

impl ClientHandle {
    fn new(id: ClientId, sender: mpsc::Sender<StreamEvent>) -> Self {
        let (done, _) = watch::channel(false);
        Self {
            id,
            sender,
            last_seen_ms: AtomicI64::new(Utc::now().timestamp_millis()),
            done,
        }
    }

    fn send(&self, event: StreamEvent) -> std::result::Result<(), &'static str> {
        match self.sender.try_send(event) {
            Ok(()) => {
                self.last_seen_ms
                    .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err("client buffer full"),
            Err(TrySendError::Closed(_)) => Err("stream closed"),
        }
    }

    /// Returns false when the done signal was already raised.
    fn close(&self) -> bool {
        self.done.send_if_modified(|done| {
            if *done {
                false
            } else {
                *done = true;
                true
            }
        })
    }

    fn last_seen(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_seen_ms.load(Ordering::Relaxed)).unwrap_or_default()
    }
}

struct Shared {
    config: StreamConfig,
    clients: RwLock<HashMap<ClientId, Arc<ClientHandle>>>,
    next_seq: AtomicU64,
    dropped: AtomicU64,
    delivery_failures: AtomicU64,
}

impl Shared {
    /// Delete the registry entry and raise its done signal. Idempotent.
    async fn remove(&self, id: &ClientId) -> bool {
        let removed = self.clients.write().await.remove(id);
        match removed {
            Some(handle) => {
                handle.close();
                info!(client_id = %id, "client removed");
                true
            }
            None => false,
        }
    }

    fn delivery_failed(&self, id: &ClientId, reason: &str) {
        self.delivery_failures.fetch_add(1, Ordering::Relaxed);
        warn!(client_id = %id, reason, "event delivery failed");
    }
}

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A registered client: its id and the receiving half of its event buffer.
///
/// Dropping `events` disconnects the client.
pub struct ClientConnection {
    pub id: ClientId,
    pub events: mpsc::Receiver<StreamEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientInfo {
    pub id: ClientId,
    #[serde(rename = "lastSeen")]
    pub last_seen: DateTime<Utc>,
    /// Written to within the configured client timeout.
    pub connected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatcherStats {
    pub connected_clients: usize,
    /// Events currently waiting in the broadcast queue.
    pub buffer_size: usize,
    pub queue_capacity: usize,
    pub dropped_events: u64,
    pub delivery_failures: u64,
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Cheap to clone; all clones share one registry and one broadcast queue.
#[derive(Clone)]
pub struct Dispatcher {
    shared: Arc<Shared>,
    queue: mpsc::Sender<StreamEvent>,
}

impl Dispatcher {
    /// Create the dispatcher and spawn its fan-out task.
    ///
    /// Must be called from within a tokio runtime. The fan-out task stops once
    /// every clone of the dispatcher is dropped.
    pub fn start(config: StreamConfig) -> Self {
        let (queue, pending) = mpsc::channel(config.queue_capacity.max(1));
        let shared = Arc::new(Shared {
            config,
            clients: RwLock::new(HashMap::new()),
            next_seq: AtomicU64::new(1),
            dropped: AtomicU64::new(0),
            delivery_failures: AtomicU64::new(0),
        });
        tokio::spawn(fan_out(Arc::clone(&shared), pending));
        Self { shared, queue }
    }

    /// Register a new client and send it the `connected` event.
    ///
    /// The entry and the first send happen under one write lock; if the send
    /// fails the entry is removed before the lock is released.
    pub async fn register(&self) -> Result<ClientConnection> {
        let id = ClientId::generate(self.shared.next_seq.fetch_add(1, Ordering::Relaxed));
        let (sender, events) = mpsc::channel(self.shared.config.client_buffer.max(1));
        let handle = Arc::new(ClientHandle::new(id.clone(), sender));

        {
            let mut clients = self.shared.clients.write().await;
            clients.insert(id.clone(), Arc::clone(&handle));
            if let Err(reason) = handle.send(StreamEvent::connected(&id)) {
                clients.remove(&id);
                handle.close();
                return Err(ContentMcpError::delivery(id.as_str(), reason));
            }
        }

        tokio::spawn(keepalive(
            Arc::clone(&self.shared),
            handle,
            self.shared.config.keepalive_interval,
        ));
        info!(client_id = %id, "client connected");

        Ok(ClientConnection { id, events })
    }

    /// Remove a client. Returns false if it was already gone.
    pub async fn remove(&self, id: &ClientId) -> bool {
        self.shared.remove(id).await
    }

    /// Send `farewell` to every client, then remove them all. Their event
    /// streams end once the buffered events are read.
    pub async fn disconnect_all(&self, farewell: StreamEvent) -> usize {
        let drained: Vec<Arc<ClientHandle>> = self
            .shared
            .clients
            .write()
            .await
            .drain()
            .map(|(_, handle)| handle)
            .collect();

        for handle in &drained {
            if let Err(reason) = handle.send(farewell.clone()) {
                self.shared.delivery_failed(&handle.id, reason);
            }
            handle.close();
        }
        info!(clients = drained.len(), "all clients disconnected");
        drained.len()
    }

    /// Queue `event` for every connected client. Never blocks; when the queue
    /// is full the event is dropped and counted. Returns whether it was queued.
    pub fn broadcast(&self, event: StreamEvent) -> bool {
        match self.queue.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                let dropped = self.shared.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(event = %event.event, dropped, "broadcast queue full, event dropped");
                false
            }
            Err(TrySendError::Closed(event)) => {
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(event = %event.event, "broadcast fan-out stopped, event dropped");
                false
            }
        }
    }

    /// Send `event` to one client, bypassing the broadcast queue.
    ///
    /// A failed send removes the client and returns a `Delivery` error.
    pub async fn send_to(&self, id: &ClientId, event: StreamEvent) -> Result<()> {
        let handle = self.shared.clients.read().await.get(id).cloned();
        let Some(handle) = handle else {
            self.shared.delivery_failed(id, "unknown client");
            return Err(ContentMcpError::delivery(id.as_str(), "unknown client"));
        };

        if let Err(reason) = handle.send(event) {
            self.shared.delivery_failed(id, reason);
            self.shared.remove(id).await;
            return Err(ContentMcpError::delivery(id.as_str(), reason));
        }
        Ok(())
    }

    /// Run `operation` and report it to `client_id` as
    /// `{kind}_start`, then `{kind}_result` or `{kind}_error`, then `{kind}_complete`.
    ///
    /// Delivery failures are logged and counted but never retried and never
    /// affect the operation. Returns whether the operation succeeded.
    pub async fn stream_operation<T, F>(
        &self,
        client_id: &ClientId,
        kind: OperationKind,
        start: Value,
        operation: F,
    ) -> bool
    where
        T: Serialize,
        F: Future<Output = Result<T>>,
    {
        self.deliver(client_id, StreamEvent::phase(kind, Phase::Start, start))
            .await;

        let outcome = operation.await.and_then(|value| {
            serde_json::to_value(value)
                .map_err(|e| ContentMcpError::Conversion(format!("failed to encode result: {e}")))
        });
        let succeeded = outcome.is_ok();

        let event = match outcome {
            Ok(data) => StreamEvent::phase(kind, Phase::Result, data),
            Err(err) => {
                warn!(error = %err, "operation failed");
                StreamEvent::phase(kind, Phase::Error, json!({"error": err.to_string()}))
            }
        };
        self.deliver(client_id, event).await;
        self.deliver(
            client_id,
            StreamEvent::phase(kind, Phase::Complete, json!({"status": "completed"})),
        )
        .await;

        succeeded
    }

    /// [`stream_operation`](Self::stream_operation) on its own task, detached
    /// from the connection that triggered it.
    pub fn spawn_operation<T, F>(
        &self,
        client_id: ClientId,
        kind: OperationKind,
        start: Value,
        operation: F,
    ) -> JoinHandle<bool>
    where
        T: Serialize + Send + 'static,
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let dispatcher = self.clone();
        let span = info_span!("operation", kind = kind.as_str(), client_id = %client_id);
        tokio::spawn(
            async move {
                dispatcher
                    .stream_operation(&client_id, kind, start, operation)
                    .await
            }
            .instrument(span),
        )
    }

    async fn deliver(&self, id: &ClientId, event: StreamEvent) {
        let name = event.event.clone();
        if self.send_to(id, event).await.is_ok() {
            debug!(client_id = %id, event = %name, "event delivered");
        }
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    /// Registered clients, sorted by id.
    pub async fn clients(&self) -> Vec<ClientInfo> {
        let now = Utc::now();
        let timeout = chrono::Duration::from_std(self.shared.config.client_timeout)
            .unwrap_or(chrono::Duration::MAX);

        let mut clients: Vec<ClientInfo> = self
            .shared
            .clients
            .read()
            .await
            .values()
            .map(|handle| {
                let last_seen = handle.last_seen();
                ClientInfo {
                    id: handle.id.clone(),
                    last_seen,
                    connected: now.signed_duration_since(last_seen) <= timeout,
                }
            })
            .collect();
        clients.sort_by(|a, b| a.id.cmp(&b.id));
        clients
    }

    pub async fn client_count(&self) -> usize {
        self.shared.clients.read().await.len()
    }

    /// Events waiting in the broadcast queue.
    pub fn queue_depth(&self) -> usize {
        self.queue.max_capacity() - self.queue.capacity()
    }

    pub fn dropped_events(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    pub fn delivery_failures(&self) -> u64 {
        self.shared.delivery_failures.load(Ordering::Relaxed)
    }

    pub async fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            connected_clients: self.client_count().await,
            buffer_size: self.queue_depth(),
            queue_capacity: self.queue.max_capacity(),
            dropped_events: self.dropped_events(),
            delivery_failures: self.delivery_failures(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

async fn fan_out(shared: Arc<Shared>, mut pending: mpsc::Receiver<StreamEvent>) {
    while let Some(event) = pending.recv().await {
        let failed: Vec<(ClientId, &'static str)> = {
            let clients = shared.clients.read().await;
            clients
                .values()
                .filter_map(|client| {
                    client
                        .send(event.clone())
                        .err()
                        .map(|reason| (client.id.clone(), reason))
                })
                .collect()
        };

        for (id, reason) in failed {
            shared.delivery_failed(&id, reason);
            shared.remove(&id).await;
        }
    }
    debug!("broadcast fan-out stopped");
}

async fn keepalive(shared: Arc<Shared>, client: Arc<ClientHandle>, period: std::time::Duration) {
    let mut done = client.done.subscribe();
    if *done.borrow() {
        return;
    }
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = done.changed() => break,
            _ = client.sender.closed() => {
                debug!(client_id = %client.id, "client stream closed");
                break;
            }
            _ = ticker.tick() => {
                if let Err(reason) = client.send(StreamEvent::keepalive()) {
                    shared.delivery_failed(&client.id, reason);
                    break;
                }
            }
        }
    }

    shared.remove(&client.id).await;
}
