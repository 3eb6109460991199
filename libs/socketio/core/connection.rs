//! Transport-bound session
//!
//! A `Connection` wraps exactly one negotiated transport connection and
//! binds it to the namespace layer. It owns:
//!
//! - the encoder/decoder pair for that transport
//! - the per-namespace [`NamespaceConn`] map
//! - a bounded write queue drained by the write loop
//! - a bounded error queue drained by the error loop
//! - the termination token every loop watches
//!
//! Both queues use a drop-new policy: when full, `write` fails with
//! `QueueFull` and `on_error` discards the error after logging it. Neither
//! ever blocks the caller.

use crate::core::codec::{Decoder, Encoder};
use crate::core::connection_state::{AtomicConnectionState, ConnectionState};
use crate::core::namespace_conn::NamespaceConn;
use crate::core::packet::Packet;
use crate::core::registry::{NamespaceHandler, NamespaceHandlers};
use crate::traits::error::{NamespaceError, Result, SocketIoError};
use crate::traits::transport::TransportConn;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct Connection {
    transport: Arc<dyn TransportConn>,
    handlers: Arc<NamespaceHandlers>,
    namespaces: RwLock<HashMap<String, Arc<NamespaceConn>>>,
    encoder: Encoder,
    decoder: Decoder,
    write_tx: mpsc::Sender<Packet>,
    write_rx: Mutex<Option<mpsc::Receiver<Packet>>>,
    error_tx: mpsc::Sender<NamespaceError>,
    error_rx: Mutex<Option<mpsc::Receiver<NamespaceError>>>,
    quit: CancellationToken,
    closed: AtomicBool,
    state: AtomicConnectionState,
}

impl Connection {
    pub fn new(
        transport: Arc<dyn TransportConn>,
        handlers: Arc<NamespaceHandlers>,
        write_capacity: usize,
        error_capacity: usize,
    ) -> Arc<Self> {
        let (write_tx, write_rx) = mpsc::channel(write_capacity.max(1));
        let (error_tx, error_rx) = mpsc::channel(error_capacity.max(1));

        Arc::new(Self {
            encoder: Encoder::new(Arc::clone(&transport)),
            decoder: Decoder::new(Arc::clone(&transport)),
            transport,
            handlers,
            namespaces: RwLock::new(HashMap::new()),
            write_tx,
            write_rx: Mutex::new(Some(write_rx)),
            error_tx,
            error_rx: Mutex::new(Some(error_rx)),
            quit: CancellationToken::new(),
            closed: AtomicBool::new(false),
            state: AtomicConnectionState::new(ConnectionState::Dialing),
        })
    }

    /// Transport connection id
    pub fn id(&self) -> &str {
        self.transport.id()
    }

    pub fn transport(&self) -> &Arc<dyn TransportConn> {
        &self.transport
    }

    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    pub fn is_open(&self) -> bool {
        self.state.is_open() && !self.quit.is_cancelled()
    }

    /// Bind the client's namespace and send its Connect packet
    ///
    /// Fails with `UnavailableRootHandler` when nothing was registered for
    /// the namespace. An encode failure is returned unchanged.
    pub async fn connect_client(self: &Arc<Self>, namespace: &str) -> Result<Arc<NamespaceConn>> {
        let handler = self
            .handlers
            .get(namespace)
            .ok_or(SocketIoError::UnavailableRootHandler)?;

        let ns_conn = self.bind_namespace(namespace, &handler);

        let context = self.transport.context();
        for conn in self.namespaces.read().values() {
            conn.set_context(context.clone());
        }

        self.state.set(ConnectionState::Handshaking);
        debug!("Sending connect for namespace '{}' on {}", namespace, self.id());
        self.encoder.encode(&Packet::connect(namespace)).await?;

        Ok(ns_conn)
    }

    /// Create and register the namespace connection for `namespace`
    pub(crate) fn bind_namespace(
        self: &Arc<Self>,
        namespace: &str,
        handler: &NamespaceHandler,
    ) -> Arc<NamespaceConn> {
        let ns_conn = Arc::new(NamespaceConn::new(
            self.id(),
            namespace,
            Arc::downgrade(self),
            Arc::clone(handler.broadcast()),
        ));
        ns_conn.set_context(self.transport.context());
        ns_conn.join(self.id());

        self.namespaces
            .write()
            .insert(namespace.to_string(), Arc::clone(&ns_conn));
        ns_conn
    }

    /// Move from `Handshaking` to `Open`
    pub(crate) fn mark_open(&self) -> bool {
        match self
            .state
            .compare_exchange(ConnectionState::Handshaking, ConnectionState::Open)
        {
            Ok(_) => true,
            Err(current) => {
                debug!("Connection {} not handshaking (state: {})", self.id(), current);
                current == ConnectionState::Open
            }
        }
    }

    /// Queue a packet for the write loop
    pub fn write(&self, packet: Packet) -> Result<()> {
        if self.quit.is_cancelled() {
            return Err(SocketIoError::ConnectionClosed(self.id().to_string()));
        }

        self.write_tx.try_send(packet).map_err(|e| match e {
            TrySendError::Full(packet) => {
                warn!(
                    "Write queue full on {}, dropping {} packet",
                    self.id(),
                    packet.header.packet_type
                );
                SocketIoError::QueueFull("write".to_string())
            }
            TrySendError::Closed(_) => SocketIoError::ConnectionClosed(self.id().to_string()),
        })
    }

    /// Report an error scoped to a namespace
    ///
    /// Never blocks; the error is dropped when the queue is full.
    pub fn on_error(&self, namespace: &str, error: SocketIoError) {
        match self.error_tx.try_send(NamespaceError::new(namespace, error)) {
            Ok(()) => {}
            Err(TrySendError::Full(dropped)) => {
                warn!("Error queue full on {}, dropping: {}", self.id(), dropped);
            }
            Err(TrySendError::Closed(dropped)) => {
                debug!("Error queue closed on {}, dropping: {}", self.id(), dropped);
            }
        }
    }

    pub async fn encode(&self, packet: &Packet) -> Result<()> {
        self.encoder.encode(packet).await
    }

    /// Read one packet; only the read loop calls this
    pub async fn decode(&self) -> Result<Packet> {
        self.decoder.decode().await
    }

    /// Close the transport once; later calls are no-ops
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        self.state.set(ConnectionState::Closing);
        self.quit.cancel();

        for conn in self.namespaces.read().values() {
            conn.leave_all();
            conn.clear_acks();
        }

        let result = self.transport.close().await;
        self.state.set(ConnectionState::Closed);
        info!("Connection {} closed", self.id());
        result
    }

    pub fn is_terminated(&self) -> bool {
        self.quit.is_cancelled()
    }

    /// Termination token shared by the three loops
    pub fn terminated(&self) -> CancellationToken {
        self.quit.clone()
    }

    pub fn namespace_conn(&self, namespace: &str) -> Option<Arc<NamespaceConn>> {
        self.namespaces.read().get(namespace).cloned()
    }

    pub fn remove_namespace(&self, namespace: &str) -> Option<Arc<NamespaceConn>> {
        self.namespaces.write().remove(namespace)
    }

    pub fn namespace_count(&self) -> usize {
        self.namespaces.read().len()
    }

    pub fn handler(&self, namespace: &str) -> Option<Arc<NamespaceHandler>> {
        self.handlers.get(namespace)
    }

    pub(crate) fn take_write_rx(&self) -> Option<mpsc::Receiver<Packet>> {
        self.write_rx.lock().take()
    }

    pub(crate) fn take_error_rx(&self) -> Option<mpsc::Receiver<NamespaceError>> {
        self.error_rx.lock().take()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id())
            .field("transport", &self.transport.kind())
            .field("state", &self.state())
            .finish()
    }
}
