//! Server-side handle of one client socket.
//!
//! The websocket task owns the socket; everything else talks to the client
//! through a cloned [`Connection`]: `emit` queues an outbound frame, `once`
//! registers a one-shot listener for an inbound reply, and `close` marks the
//! socket gone and fails every pending listener.

use crate::protocol::{Reply, ServerMsg, Topic};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

struct Inner {
    id: Uuid,
    outbox: mpsc::UnboundedSender<ServerMsg>,
    /// Ordered by registration so the oldest listener gets the next reply.
    listeners: Mutex<BTreeMap<u64, (Topic, oneshot::Sender<Reply>)>>,
    next_listener: AtomicU64,
    closed: CancellationToken,
}

#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Connection {
    /// New connection plus the receiving end of its outbound queue.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ServerMsg>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Connection {
            inner: Arc::new(Inner {
                id: Uuid::new_v4(),
                outbox: tx,
                listeners: Mutex::new(BTreeMap::new()),
                next_listener: AtomicU64::new(0),
                closed: CancellationToken::new(),
            }),
        };
        (conn, rx)
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Queue a frame for the client. Returns `false` once the socket is gone.
    pub fn emit(&self, msg: ServerMsg) -> bool {
        if self.is_closed() {
            return false;
        }
        self.inner.outbox.send(msg).is_ok()
    }

    /// Register a one-shot listener for `topic`. The registration is removed
    /// when the reply is delivered or when the [`Listener`] is dropped,
    /// whichever happens first.
    pub fn once(&self, topic: Topic) -> Listener {
        let id = self.inner.next_listener.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        {
            let mut listeners = self.inner.listeners.lock();
            // a closed connection never answers: leave `tx` to drop
            if !self.inner.closed.is_cancelled() {
                listeners.insert(id, (topic, tx));
            }
        }
        Listener {
            id,
            rx,
            conn: Arc::downgrade(&self.inner),
        }
    }

    /// Hand an inbound reply to the oldest listener waiting on `topic`.
    /// Returns `false` when nobody was listening.
    pub fn deliver(&self, topic: Topic, reply: Reply) -> bool {
        let sender = {
            let mut listeners = self.inner.listeners.lock();
            let key = listeners
                .iter()
                .find(|(_, (t, _))| *t == topic)
                .map(|(k, _)| *k);
            key.and_then(|k| listeners.remove(&k))
        };
        match sender {
            Some((_, tx)) => tx.send(reply).is_ok(),
            None => false,
        }
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    /// Mark the socket as gone. Pending listeners resolve as disconnected.
    pub fn close(&self) {
        self.inner.closed.cancel();
        self.inner.listeners.lock().clear();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.is_cancelled()
    }

    /// Resolves once [`Connection::close`] has been called.
    pub async fn closed(&self) {
        self.inner.closed.cancelled().await
    }
}

/// Pending one-shot registration created by [`Connection::once`].
pub struct Listener {
    id: u64,
    rx: oneshot::Receiver<Reply>,
    conn: Weak<Inner>,
}

impl Listener {
    /// Wait for the reply. `None` means the connection closed first.
    pub async fn recv(&mut self) -> Option<Reply> {
        (&mut self.rx).await.ok()
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Some(inner) = self.conn.upgrade() {
            inner.listeners.lock().remove(&self.id);
        }
    }
}
