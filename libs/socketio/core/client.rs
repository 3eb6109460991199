use crate::core::backoff::{BackOff, DEFAULT_FACTOR, DEFAULT_JITTER};
use crate::core::config::ClientOptions;
use crate::core::connection::Connection;
use crate::core::namespace_conn::NamespaceConn;
use crate::core::packet::canonical_namespace;
use crate::core::pipeline;
use crate::core::registry::{NamespaceHandler, NamespaceHandlers};
use crate::traits::error::{Result, SocketIoError};
use crate::traits::handler::{DisconnectCallback, EventHandler};
use crate::traits::transport::Dialer;
use crate::transport::EngineDialer;
use crossbeam_channel::{unbounded, Receiver, Sender};
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use reqwest::Url;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Fixed path prefix of every handshake URL
pub const PROTOCOL_ROOT: &str = "/socket.io";

/// Lifecycle events published by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Server confirmed the namespace
    Connected,
    /// Connection lost (reason)
    Disconnected(String),
    /// Reconnect attempt about to start (attempt number, from 1)
    Reconnecting(u32),
    /// Reconnect sequence gave up (attempts made)
    ReconnectExhausted(u32),
    /// Error occurred
    Error(String),
}

/// Socket.IO client bound to one namespace
///
/// Cheap to clone; clones share the connection, the handler registry and
/// the reconnect state.
///
/// Handlers registered through the client belong to its namespace and are
/// kept across reconnects. Reconnection is driven by the disconnect path:
/// registering any handler installs it, and [`Client::on_disconnect`]
/// adds the user callback behind it. A client with no handlers at all
/// cannot complete a handshake, so it never needs one.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    namespace: String,
    url: Url,
    options: ClientOptions,
    dialer: Arc<dyn Dialer>,
    handlers: Arc<NamespaceHandlers>,
    /// Replaced wholesale on every successful connect
    conn: RwLock<Option<Arc<Connection>>>,
    backoff: Mutex<BackOff>,
    reconnecting: AtomicBool,
    max_attempts: Option<u32>,
    event_tx: Sender<ClientEvent>,
    event_rx: Receiver<ClientEvent>,
}

type UserDisconnect = Arc<dyn Fn(&NamespaceConn, &str) + Send + Sync>;

/// Clears the reconnecting flag however the sequence ends
struct ReconnectGuard<'a>(&'a AtomicBool);

impl Drop for ReconnectGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Client {
    /// Create a client dialing through the bundled Engine.IO transport
    ///
    /// `address` looks like `http://host:port/namespace`.
    pub fn new(address: &str, options: ClientOptions) -> Result<Self> {
        Self::with_dialer(address, options, Arc::new(EngineDialer::new()))
    }

    /// Create a client with a custom transport dialer
    pub fn with_dialer(address: &str, options: ClientOptions, dialer: Arc<dyn Dialer>) -> Result<Self> {
        let (url, namespace) = parse_address(address)?;

        let backoff = BackOff::new(
            options.reconnection_delay,
            options.reconnection_delay_max,
            DEFAULT_FACTOR,
            DEFAULT_JITTER,
        );
        let max_attempts = options.max_reconnection_attempts();
        let (event_tx, event_rx) = unbounded();

        debug!("Created client for {} (namespace '{}')", url, namespace);

        Ok(Self {
            inner: Arc::new(ClientInner {
                namespace,
                url,
                options,
                dialer,
                handlers: Arc::new(NamespaceHandlers::new()),
                conn: RwLock::new(None),
                backoff: Mutex::new(backoff),
                reconnecting: AtomicBool::new(false),
                max_attempts,
                event_tx,
                event_rx,
            }),
        })
    }

    /// Canonical namespace this client talks to
    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    /// Handshake URL, path rewritten under [`PROTOCOL_ROOT`]
    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    /// Dial, bind the namespace and start the connection's loops
    pub async fn connect(&self) -> Result<()> {
        self.inner.connect().await
    }

    /// Close the current connection
    ///
    /// Resets the backoff; does not trigger a reconnect.
    pub async fn close(&self) -> Result<()> {
        self.inner.backoff.lock().reset();
        let conn = self.inner.conn.read().clone();
        match conn {
            Some(conn) => conn.close().await,
            None => Ok(()),
        }
    }

    /// Run the backoff-driven reconnect sequence
    ///
    /// Returns `Ok` immediately when another sequence is already running.
    pub async fn reconnect(&self) -> Result<()> {
        self.inner.reconnect().await
    }

    /// Emit an event on the client's namespace
    ///
    /// A no-op when no connection is bound; queueing failures are routed
    /// to the namespace's error handler.
    pub fn emit(&self, event: &str, args: Vec<Value>) {
        let Some((conn, ns_conn)) = self.bound() else {
            info!("Namespace '{}' not connected, dropping '{}'", self.inner.namespace, event);
            return;
        };

        if let Err(e) = ns_conn.emit(event, args) {
            warn!("Failed to emit '{}': {}", event, e);
            conn.on_error(&self.inner.namespace, e);
        }
    }

    /// Emit an event and register a callback for its acknowledgement
    ///
    /// Returns the ack id, or `None` when nothing was sent.
    pub fn emit_with_ack<F>(&self, event: &str, args: Vec<Value>, callback: F) -> Option<u64>
    where
        F: FnOnce(Vec<Value>) + Send + 'static,
    {
        let Some((conn, ns_conn)) = self.bound() else {
            info!("Namespace '{}' not connected, dropping '{}'", self.inner.namespace, event);
            return None;
        };

        match ns_conn.emit_with_ack(event, args, callback) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("Failed to emit '{}': {}", event, e);
                conn.on_error(&self.inner.namespace, e);
                None
            }
        }
    }

    pub fn on_connect<F>(&self, f: F)
    where
        F: Fn(&NamespaceConn) -> Result<()> + Send + Sync + 'static,
    {
        self.handler().on_connect(f);
    }

    /// Register the disconnect callback
    ///
    /// When reconnection is enabled the reconnect sequence runs first; the
    /// callback is invoked afterwards whatever its outcome.
    pub fn on_disconnect<F>(&self, f: F)
    where
        F: Fn(&NamespaceConn, &str) + Send + Sync + 'static,
    {
        let callback: UserDisconnect = Arc::new(f);
        self.handler()
            .set_disconnect_callback(self.disconnect_callback(Some(callback)));
    }

    pub fn on_error<F>(&self, f: F)
    where
        F: Fn(Option<&NamespaceConn>, &SocketIoError) + Send + Sync + 'static,
    {
        self.handler().on_error(f);
    }

    pub fn on_event<F>(&self, event: &str, f: F)
    where
        F: Fn(&NamespaceConn, Vec<Value>) -> Vec<Value> + Send + Sync + 'static,
    {
        self.handler().on_event(event, f);
    }

    pub fn on_event_handler<H: EventHandler>(&self, event: &str, handler: H) {
        self.handler().on_event_handler(event, handler);
    }

    /// Whether the current connection completed its namespace handshake
    pub fn is_connected(&self) -> bool {
        self.connection().map(|conn| conn.is_open()).unwrap_or(false)
    }

    pub fn is_reconnecting(&self) -> bool {
        self.inner.reconnecting.load(Ordering::Acquire)
    }

    /// Snapshot of the current connection
    pub fn connection(&self) -> Option<Arc<Connection>> {
        self.inner.conn.read().clone()
    }

    /// Reconnect attempts consumed since the last explicit close
    pub fn backoff_attempts(&self) -> u32 {
        self.inner.backoff.lock().attempts()
    }

    /// Try to receive an event (non-blocking)
    pub fn try_recv_event(&self) -> Option<ClientEvent> {
        self.inner.event_rx.try_recv().ok()
    }

    /// Receive an event (blocking)
    pub fn recv_event(&self) -> std::result::Result<ClientEvent, crossbeam_channel::RecvError> {
        self.inner.event_rx.recv()
    }

    /// Handler bundle for the client's namespace, created on first use
    ///
    /// A fresh bundle gets the reconnect-only disconnect path.
    fn handler(&self) -> Arc<NamespaceHandler> {
        let handler = self.inner.handlers.get_or_create(&self.inner.namespace);
        if !handler.has_disconnect_callback() {
            handler.set_disconnect_callback_if_absent(self.disconnect_callback(None));
        }
        handler
    }

    /// Disconnect path: reconnect when enabled, then notify `user`
    fn disconnect_callback(&self, user: Option<UserDisconnect>) -> DisconnectCallback {
        let inner = Arc::downgrade(&self.inner);

        Arc::new(move |conn: Arc<NamespaceConn>, reason: String| {
            let inner = inner.clone();
            let user = user.clone();
            async move {
                if let Some(inner) = inner.upgrade() {
                    if inner.options.reconnection {
                        if let Err(e) = inner.reconnect().await {
                            debug!("Reconnect after '{}' ended: {}", reason, e);
                        }
                    }
                }
                if let Some(user) = user {
                    user(&conn, &reason);
                }
            }
            .boxed()
        })
    }

    fn bound(&self) -> Option<(Arc<Connection>, Arc<NamespaceConn>)> {
        let conn = self.connection()?;
        let ns_conn = conn.namespace_conn(&self.inner.namespace)?;
        Some((conn, ns_conn))
    }
}

impl ClientInner {
    async fn connect(&self) -> Result<()> {
        let options = self.options.dial_options().await;
        info!("Dialing {} via {:?}", self.url, options.transports);

        let transport = self.dialer.dial(&self.url, &options).await.map_err(|e| {
            warn!("Dial to {} failed: {}", self.url, e);
            e
        })?;
        info!("Transport {} negotiated ({})", transport.id(), transport.kind());

        let conn = Connection::new(
            transport,
            Arc::clone(&self.handlers),
            self.options.write_queue_capacity,
            self.options.error_queue_capacity,
        );

        if let Err(e) = conn.connect_client(&self.namespace).await {
            error!("Handshake for namespace '{}' failed: {}", self.namespace, e);
            if let Err(close_err) = conn.close().await {
                warn!("Failed to close connection {}: {}", conn.id(), close_err);
            }
            let _ = self.event_tx.send(ClientEvent::Error(e.to_string()));
            if let Some(handler) = self.handlers.get(&self.namespace) {
                handler.dispatch_error(None, &e);
            }
            return Err(e);
        }

        let previous = self.conn.write().replace(Arc::clone(&conn));
        if let Some(previous) = previous {
            if let Err(e) = previous.close().await {
                warn!("Failed to close previous connection {}: {}", previous.id(), e);
            }
        }

        pipeline::spawn(conn, self.namespace.clone(), self.event_tx.clone());
        Ok(())
    }

    async fn reconnect(&self) -> Result<()> {
        if self
            .reconnecting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Reconnect already in progress");
            return Ok(());
        }
        let _guard = ReconnectGuard(&self.reconnecting);

        loop {
            let (attempt, delay) = {
                let mut backoff = self.backoff.lock();
                let attempts = backoff.attempts();
                if self.max_attempts.is_some_and(|max| attempts >= max) {
                    drop(backoff);
                    return Err(self.reconnect_exhausted(attempts));
                }
                (attempts + 1, backoff.duration())
            };

            info!("Client will wait {}ms before reconnect attempt {}", delay.as_millis(), attempt);
            let _ = self.event_tx.send(ClientEvent::Reconnecting(attempt));
            tokio::time::sleep(delay).await;

            match self.connect().await {
                Ok(()) => {
                    info!("Reconnected on attempt {}", attempt);
                    return Ok(());
                }
                Err(e) => error!("Reconnect attempt {} failed: {}", attempt, e),
            }
        }
    }

    fn reconnect_exhausted(&self, attempts: u32) -> SocketIoError {
        let err = SocketIoError::ReconnectExhausted { attempts };
        error!("{}", err);
        let _ = self.event_tx.send(ClientEvent::ReconnectExhausted(attempts));
        if let Some(handler) = self.handlers.get(&self.namespace) {
            handler.dispatch_error(None, &err);
        }
        err
    }
}

/// Split an address into the handshake URL and the canonical namespace
fn parse_address(address: &str) -> Result<(Url, String)> {
    if address.is_empty() {
        return Err(SocketIoError::EmptyAddress);
    }

    let mut url = Url::parse(address).map_err(|e| SocketIoError::InvalidUrl(e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(SocketIoError::InvalidUrl(format!("{} has no host", address)));
    }

    let namespace = canonical_namespace(url.path().trim_end_matches('/'));
    let path = if namespace.is_empty() {
        format!("{}/", PROTOCOL_ROOT)
    } else {
        format!("{}/{}/", PROTOCOL_ROOT, namespace)
    };
    url.set_path(&path);

    Ok((url, namespace))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_address() {
        assert!(matches!(parse_address(""), Err(SocketIoError::EmptyAddress)));
    }

    #[test]
    fn test_unparseable_address() {
        assert!(matches!(parse_address("not a url"), Err(SocketIoError::InvalidUrl(_))));
    }

    #[test]
    fn test_root_namespace_paths() {
        for address in ["http://localhost:3000", "http://localhost:3000/"] {
            let (url, namespace) = parse_address(address).unwrap();
            assert_eq!(namespace, "");
            assert_eq!(url.path(), "/socket.io/");
        }
    }

    #[test]
    fn test_namespace_is_extracted() {
        let (url, namespace) = parse_address("http://example.com/chat/").unwrap();
        assert_eq!(namespace, "chat");
        assert_eq!(url.as_str(), "http://example.com/socket.io/chat/");
    }

    #[test]
    fn test_query_is_preserved() {
        let (url, namespace) = parse_address("https://example.com/ns?token=abc").unwrap();
        assert_eq!(namespace, "ns");
        assert_eq!(url.path(), "/socket.io/ns/");
        assert_eq!(url.query(), Some("token=abc"));
    }

    #[test]
    fn test_reconnect_guard_clears_flag() {
        let flag = AtomicBool::new(true);
        {
            let _guard = ReconnectGuard(&flag);
        }
        assert!(!flag.load(Ordering::Acquire));
    }
}
