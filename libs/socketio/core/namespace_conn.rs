//! Per-namespace view of a connection
//!
//! A `NamespaceConn` never owns its [`Connection`]; it holds a weak
//! reference so dropping the connection (on close or reconnect) is not
//! held back by handlers that stashed a namespace handle.

use crate::core::broadcast::Broadcast;
use crate::core::connection::Connection;
use crate::core::packet::Packet;
use crate::traits::error::{Result, SocketIoError};
use crate::traits::handler::AckCallback;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct NamespaceConn {
    id: String,
    namespace: String,
    connection: Weak<Connection>,
    broadcast: Arc<Broadcast>,
    context: RwLock<CancellationToken>,
    sid: RwLock<Option<String>>,
    next_ack_id: AtomicU64,
    acks: Mutex<HashMap<u64, AckCallback>>,
}

impl NamespaceConn {
    pub fn new(
        id: impl Into<String>,
        namespace: impl Into<String>,
        connection: Weak<Connection>,
        broadcast: Arc<Broadcast>,
    ) -> Self {
        Self {
            id: id.into(),
            namespace: namespace.into(),
            connection,
            broadcast,
            context: RwLock::new(CancellationToken::new()),
            sid: RwLock::new(None),
            next_ack_id: AtomicU64::new(0),
            acks: Mutex::new(HashMap::new()),
        }
    }

    /// Transport connection id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Canonical namespace name
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Session id assigned by the server on namespace connect
    pub fn sid(&self) -> Option<String> {
        self.sid.read().clone()
    }

    pub(crate) fn set_sid(&self, sid: Option<String>) {
        *self.sid.write() = sid;
    }

    /// The owning connection, if it is still alive
    pub fn connection(&self) -> Option<Arc<Connection>> {
        self.connection.upgrade()
    }

    pub fn is_connected(&self) -> bool {
        self.connection()
            .map(|conn| conn.is_open())
            .unwrap_or(false)
    }

    /// Cancellation handle of the underlying transport
    pub fn context(&self) -> CancellationToken {
        self.context.read().clone()
    }

    pub fn set_context(&self, context: CancellationToken) {
        *self.context.write() = context;
    }

    /// Queue an event for this namespace
    pub fn emit(&self, event: impl Into<String>, args: Vec<Value>) -> Result<()> {
        self.write(Packet::event(&self.namespace, event, args))
    }

    /// Queue an event and register a callback for the server's acknowledgement
    ///
    /// Returns the allocated ack id.
    pub fn emit_with_ack<F>(&self, event: impl Into<String>, args: Vec<Value>, callback: F) -> Result<u64>
    where
        F: FnOnce(Vec<Value>) + Send + 'static,
    {
        let id = self.next_ack_id.fetch_add(1, Ordering::Relaxed);
        self.acks.lock().insert(id, Box::new(callback));

        let mut packet = Packet::event(&self.namespace, event, args);
        packet.header.id = Some(id);

        if let Err(e) = self.write(packet) {
            self.acks.lock().remove(&id);
            return Err(e);
        }
        Ok(id)
    }

    /// Reply to a server event that asked for an acknowledgement
    pub fn ack(&self, id: u64, args: Vec<Value>) -> Result<()> {
        self.write(Packet::ack(&self.namespace, id, args))
    }

    /// Invoke and drop the callback stored for an ack id
    ///
    /// Returns false for ids with no pending callback.
    pub fn resolve_ack(&self, id: u64, args: Vec<Value>) -> bool {
        let callback = self.acks.lock().remove(&id);
        match callback {
            Some(callback) => {
                callback(args);
                true
            }
            None => {
                debug!("Ack {} on namespace '{}' has no pending callback", id, self.namespace);
                false
            }
        }
    }

    pub fn pending_acks(&self) -> usize {
        self.acks.lock().len()
    }

    /// Drop every pending ack callback without invoking it
    pub(crate) fn clear_acks(&self) -> usize {
        let dropped = std::mem::take(&mut *self.acks.lock());
        if !dropped.is_empty() {
            debug!(
                "Dropping {} unanswered acks on namespace '{}'",
                dropped.len(),
                self.namespace
            );
        }
        dropped.len()
    }

    pub fn join(&self, room: &str) {
        self.broadcast.join(room, &self.id);
    }

    pub fn leave(&self, room: &str) {
        self.broadcast.leave(room, &self.id);
    }

    pub fn leave_all(&self) {
        self.broadcast.leave_all(&self.id);
    }

    pub fn rooms(&self) -> Vec<String> {
        self.broadcast.rooms(&self.id)
    }

    fn write(&self, packet: Packet) -> Result<()> {
        let connection = self.connection().ok_or(SocketIoError::NotConnected)?;
        connection.write(packet)
    }
}

impl fmt::Debug for NamespaceConn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamespaceConn")
            .field("id", &self.id)
            .field("namespace", &self.namespace)
            .field("sid", &*self.sid.read())
            .field("pending_acks", &self.pending_acks())
            .finish()
    }
}
