//! Common test utilities for socketio integration tests
//!
//! An in-memory dialer and transport: the test plays the server by pushing
//! frames into the transport and inspecting what the client wrote.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use socketio::{DialOptions, Dialer, Frame, SocketIoError, TransportConn, TransportKind};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

/// Transport backed by an unbounded channel
pub struct MockTransport {
    id: String,
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<Frame>>,
    written: Mutex<Vec<Frame>>,
    context: CancellationToken,
    closes: AtomicUsize,
    closed: AtomicBool,
}

#[async_trait]
impl TransportConn for MockTransport {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> TransportKind {
        TransportKind::WebSocket
    }

    fn context(&self) -> CancellationToken {
        self.context.clone()
    }

    async fn read_frame(&self) -> socketio::Result<Frame> {
        let mut inbound = self.inbound.lock().await;
        tokio::select! {
            _ = self.context.cancelled() => Err(SocketIoError::ConnectionClosed(self.id.clone())),
            frame = inbound.recv() => frame.ok_or_else(|| SocketIoError::Transport("server hung up".into())),
        }
    }

    async fn write_frame(&self, frame: Frame) -> socketio::Result<()> {
        if self.context.is_cancelled() {
            return Err(SocketIoError::ConnectionClosed(self.id.clone()));
        }
        self.written.lock().push(frame);
        Ok(())
    }

    async fn close(&self) -> socketio::Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.context.cancel();
        }
        Ok(())
    }
}

/// The test's side of a [`MockTransport`]
#[derive(Clone)]
pub struct MockServer {
    tx: mpsc::UnboundedSender<Frame>,
    transport: Arc<MockTransport>,
}

impl MockServer {
    pub fn pair(id: &str) -> (Self, Arc<MockTransport>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Arc::new(MockTransport {
            id: id.to_string(),
            inbound: tokio::sync::Mutex::new(rx),
            written: Mutex::new(Vec::new()),
            context: CancellationToken::new(),
            closes: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        });
        (
            Self {
                tx,
                transport: Arc::clone(&transport),
            },
            transport,
        )
    }

    /// Deliver a text frame to the client
    pub fn send_text(&self, text: &str) {
        let _ = self.tx.send(Frame::Text(text.to_string()));
    }

    /// Text frames written by the client, in order
    pub fn written_texts(&self) -> Vec<String> {
        self.transport
            .written
            .lock()
            .iter()
            .filter_map(|frame| frame.as_text().map(String::from))
            .collect()
    }

    pub fn has_written(&self, text: &str) -> bool {
        self.written_texts().iter().any(|t| t == text)
    }

    pub fn is_closed(&self) -> bool {
        self.transport.closed.load(Ordering::Acquire)
    }

    pub fn close_calls(&self) -> usize {
        self.transport.closes.load(Ordering::SeqCst)
    }

    pub fn id(&self) -> &str {
        &self.transport.id
    }
}

/// Dialer with a scripted accept/refuse sequence
pub struct MockDialer {
    script: Mutex<VecDeque<bool>>,
    fallback: bool,
    attempts: AtomicUsize,
    servers: Mutex<Vec<MockServer>>,
    last_options: Mutex<Option<DialOptions>>,
}

impl MockDialer {
    /// Follow `script`, then answer every further dial with `fallback`
    pub fn scripted(script: Vec<bool>, fallback: bool) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            attempts: AtomicUsize::new(0),
            servers: Mutex::new(Vec::new()),
            last_options: Mutex::new(None),
        })
    }

    pub fn accepting() -> Arc<Self> {
        Self::scripted(Vec::new(), true)
    }

    pub fn refusing() -> Arc<Self> {
        Self::scripted(Vec::new(), false)
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn servers(&self) -> Vec<MockServer> {
        self.servers.lock().clone()
    }

    pub fn server(&self, index: usize) -> Option<MockServer> {
        self.servers.lock().get(index).cloned()
    }

    pub fn last_options(&self) -> Option<DialOptions> {
        self.last_options.lock().clone()
    }
}

#[async_trait]
impl Dialer for MockDialer {
    async fn dial(&self, _url: &socketio::Url, options: &DialOptions) -> socketio::Result<Arc<dyn TransportConn>> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_options.lock() = Some(options.clone());

        let accept = self.script.lock().pop_front().unwrap_or(self.fallback);
        if !accept {
            return Err(SocketIoError::Transport(format!("mock dial {} refused", attempt)));
        }

        let (server, transport) = MockServer::pair(&format!("mock-{}", attempt));
        self.servers.lock().push(server);
        let transport: Arc<dyn TransportConn> = transport;
        Ok(transport)
    }
}

/// Poll `condition` every few milliseconds until it holds or `timeout` passes
pub async fn wait_until<F>(timeout: Duration, condition: F) -> bool
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
