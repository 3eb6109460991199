//! Engine.IO v4 session
//!
//! ```text
//! 0{"sid":..,"pingInterval":..}   open      server -> client
//! 1                               close     either way
//! 2 / 3                           ping/pong server pings, client answers
//! 4<socket.io packet>             message   either way
//! 6                               noop      skipped
//! ```
//!
//! A carrier moves Engine.IO packets over one concrete transport; the
//! session on top answers pings, watches for silence, and hands Socket.IO
//! frames to the connection.

use crate::traits::error::{Result, SocketIoError};
use crate::traits::transport::{Frame, TransportConn, TransportKind};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Protocol revision sent as `EIO=`
pub const ENGINE_PROTOCOL: u8 = 4;

/// Handshake data sent by the server in the open packet
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPacket {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Milliseconds
    pub ping_interval: u64,
    /// Milliseconds
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

impl OpenPacket {
    /// How long a read may see nothing before the session is considered dead
    pub fn read_timeout(&self, ping_interval: Option<Duration>, ping_timeout: Option<Duration>) -> Duration {
        ping_interval.unwrap_or(Duration::from_millis(self.ping_interval))
            + ping_timeout.unwrap_or(Duration::from_millis(self.ping_timeout))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnginePacket {
    Open(Box<OpenPacket>),
    Close,
    Ping(String),
    Pong(String),
    Message(Frame),
    Upgrade,
    Noop,
}

impl EnginePacket {
    /// Parse a text-encoded packet
    pub fn parse(text: &str) -> Result<Self> {
        let mut chars = text.chars();
        let kind = chars
            .next()
            .ok_or_else(|| SocketIoError::Decode("empty engine packet".to_string()))?;
        let data = chars.as_str();

        match kind {
            '0' => serde_json::from_str(data)
                .map(|open| EnginePacket::Open(Box::new(open)))
                .map_err(|e| SocketIoError::Decode(format!("invalid open packet: {}", e))),
            '1' => Ok(EnginePacket::Close),
            '2' => Ok(EnginePacket::Ping(data.to_string())),
            '3' => Ok(EnginePacket::Pong(data.to_string())),
            '4' => Ok(EnginePacket::Message(Frame::Text(data.to_string()))),
            '5' => Ok(EnginePacket::Upgrade),
            '6' => Ok(EnginePacket::Noop),
            other => Err(SocketIoError::Decode(format!(
                "unknown engine packet type '{}'",
                other
            ))),
        }
    }

    /// Text encoding; binary messages are carrier-specific
    pub fn encode_text(&self) -> Result<String> {
        match self {
            EnginePacket::Close => Ok("1".to_string()),
            EnginePacket::Ping(data) => Ok(format!("2{}", data)),
            EnginePacket::Pong(data) => Ok(format!("3{}", data)),
            EnginePacket::Message(Frame::Text(text)) => Ok(format!("4{}", text)),
            EnginePacket::Upgrade => Ok("5".to_string()),
            EnginePacket::Noop => Ok("6".to_string()),
            EnginePacket::Message(Frame::Binary(_)) | EnginePacket::Open(_) => Err(
                SocketIoError::Encode(format!("{:?} has no text encoding", self)),
            ),
        }
    }
}

/// Moves Engine.IO packets over one concrete transport
#[async_trait]
pub trait Carrier: Send + Sync + 'static {
    /// Wait for the next batch of packets
    async fn receive(&self) -> Result<Vec<EnginePacket>>;

    async fn send(&self, packets: Vec<EnginePacket>) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// An open Engine.IO session
pub struct EngineConn {
    sid: String,
    kind: TransportKind,
    carrier: Box<dyn Carrier>,
    read_timeout: Duration,
    pending: Mutex<VecDeque<Frame>>,
    /// One outbound request at a time; polling servers reject overlapping posts
    send_lock: tokio::sync::Mutex<()>,
    context: CancellationToken,
    closed: AtomicBool,
}

impl EngineConn {
    /// Wrap a carrier whose handshake already completed
    ///
    /// `initial` holds packets that arrived together with the open packet.
    pub fn new(
        open: &OpenPacket,
        kind: TransportKind,
        carrier: Box<dyn Carrier>,
        read_timeout: Duration,
        initial: Vec<EnginePacket>,
    ) -> Self {
        let pending = initial
            .into_iter()
            .filter_map(|packet| match packet {
                EnginePacket::Message(frame) => Some(frame),
                _ => None,
            })
            .collect();

        info!(
            "Engine session {} open over {} (read timeout {:?})",
            open.sid, kind, read_timeout
        );

        Self {
            sid: open.sid.clone(),
            kind,
            carrier,
            read_timeout,
            pending: Mutex::new(pending),
            send_lock: tokio::sync::Mutex::new(()),
            context: CancellationToken::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    async fn receive(&self) -> Result<Vec<EnginePacket>> {
        tokio::select! {
            biased;
            _ = self.context.cancelled() => Err(self.closed_error()),
            received = tokio::time::timeout(self.read_timeout, self.carrier.receive()) => match received {
                Ok(packets) => packets,
                Err(_) => Err(SocketIoError::Timeout(format!(
                    "no packet from server for {:?}",
                    self.read_timeout
                ))),
            },
        }
    }

    async fn send(&self, packets: Vec<EnginePacket>) -> Result<()> {
        let _guard = self.send_lock.lock().await;
        self.carrier.send(packets).await
    }

    fn closed_error(&self) -> SocketIoError {
        SocketIoError::ConnectionClosed(format!("engine session {}", self.sid))
    }
}

#[async_trait]
impl TransportConn for EngineConn {
    fn id(&self) -> &str {
        &self.sid
    }

    fn kind(&self) -> TransportKind {
        self.kind
    }

    fn context(&self) -> CancellationToken {
        self.context.clone()
    }

    async fn read_frame(&self) -> Result<Frame> {
        loop {
            let next = self.pending.lock().pop_front();
            if let Some(frame) = next {
                return Ok(frame);
            }
            if self.context.is_cancelled() {
                return Err(self.closed_error());
            }

            let packets = self.receive().await?;
            let mut server_closed = false;

            for packet in packets {
                match packet {
                    EnginePacket::Message(frame) => {
                        self.pending.lock().push_back(frame);
                    }
                    EnginePacket::Ping(data) => {
                        debug!("Ping from server on {}", self.sid);
                        self.send(vec![EnginePacket::Pong(data)]).await?;
                    }
                    EnginePacket::Close => server_closed = true,
                    EnginePacket::Noop | EnginePacket::Pong(_) | EnginePacket::Upgrade => {}
                    EnginePacket::Open(_) => warn!("Unexpected open packet on {}", self.sid),
                }
            }

            if server_closed {
                // The carrier is released by close()
                info!("Server closed engine session {}", self.sid);
                self.context.cancel();
            }
        }
    }

    async fn write_frame(&self, frame: Frame) -> Result<()> {
        if self.context.is_cancelled() {
            return Err(self.closed_error());
        }
        self.send(vec![EnginePacket::Message(frame)]).await
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.context.cancel();
        let _guard = self.send_lock.lock().await;
        self.carrier.close().await
    }
}
