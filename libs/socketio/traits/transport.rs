//! Transport seam
//!
//! The client engine never touches sockets directly. It asks a [`Dialer`]
//! for a [`TransportConn`] and from then on only reads and writes
//! [`Frame`]s. The bundled [`EngineDialer`](crate::transport::EngineDialer)
//! speaks Engine.IO over long-polling or WebSocket; tests substitute an
//! in-memory implementation.

use crate::traits::error::{Result, SocketIoError};
use crate::traits::headers::Headers;
use async_trait::async_trait;
use reqwest::Url;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// One Socket.IO frame as carried by the transport
///
/// Text frames hold an encoded packet; binary frames hold attachments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl Frame {
    /// Get the frame as text, if it is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Frame::Text(s) => Some(s),
            Frame::Binary(_) => None,
        }
    }

    /// Get the frame as binary, if it is binary
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Frame::Text(_) => None,
            Frame::Binary(b) => Some(b),
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Frame::Text(_))
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Frame::Binary(_))
    }
}

/// Transport candidates, tried in order at dial time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// HTTP long-polling
    Polling,
    /// Persistent full-duplex WebSocket
    WebSocket,
}

impl TransportKind {
    /// Query-string name of the transport
    pub fn name(&self) -> &'static str {
        match self {
            TransportKind::Polling => "polling",
            TransportKind::WebSocket => "websocket",
        }
    }

    /// Candidate list used when the options don't name any
    pub fn defaults() -> Vec<TransportKind> {
        vec![TransportKind::Polling, TransportKind::WebSocket]
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TransportKind {
    type Err = SocketIoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "polling" => Ok(TransportKind::Polling),
            "websocket" | "ws" => Ok(TransportKind::WebSocket),
            other => Err(SocketIoError::Configuration(format!(
                "unknown transport '{}'",
                other
            ))),
        }
    }
}

/// Everything a dialer needs besides the URL
#[derive(Debug, Clone, Default)]
pub struct DialOptions {
    /// Ordered candidates; the first that completes a handshake wins
    pub transports: Vec<TransportKind>,
    /// Headers for the handshake request(s)
    pub headers: Headers,
    /// Overrides the server-advertised ping timeout
    pub ping_timeout: Option<Duration>,
    /// Overrides the server-advertised ping interval
    pub ping_interval: Option<Duration>,
}

/// A negotiated transport connection
///
/// `read_frame` is only ever called from one task at a time (the read loop);
/// `write_frame` may be called from the write loop and from the handshake.
#[async_trait]
pub trait TransportConn: Send + Sync + 'static {
    /// Session id assigned by the server
    fn id(&self) -> &str;

    /// Which candidate won negotiation
    fn kind(&self) -> TransportKind;

    /// Cancelled when the transport closes
    fn context(&self) -> CancellationToken;

    /// Read the next Socket.IO frame
    async fn read_frame(&self) -> Result<Frame>;

    /// Write one Socket.IO frame
    async fn write_frame(&self, frame: Frame) -> Result<()>;

    /// Close the transport. Repeated calls are no-ops.
    async fn close(&self) -> Result<()>;
}

/// Opens transport connections
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    async fn dial(&self, url: &Url, options: &DialOptions) -> Result<Arc<dyn TransportConn>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_kind_parsing() {
        assert_eq!("polling".parse::<TransportKind>().unwrap(), TransportKind::Polling);
        assert_eq!(" WebSocket ".parse::<TransportKind>().unwrap(), TransportKind::WebSocket);
        assert!("carrier-pigeon".parse::<TransportKind>().is_err());
    }

    #[test]
    fn test_default_candidates_start_with_polling() {
        assert_eq!(
            TransportKind::defaults(),
            vec![TransportKind::Polling, TransportKind::WebSocket]
        );
    }

    #[test]
    fn test_frame_accessors() {
        let text = Frame::Text("2[\"hi\"]".into());
        assert!(text.is_text());
        assert_eq!(text.as_text(), Some("2[\"hi\"]"));
        assert!(text.as_binary().is_none());

        let bin = Frame::Binary(vec![1, 2, 3]);
        assert!(bin.is_binary());
        assert_eq!(bin.as_binary(), Some(&[1u8, 2, 3][..]));
    }
}
