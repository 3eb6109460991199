//! # Transport
//!
//! The bundled Engine.IO v4 dialer. Candidates are tried in order and the
//! first one that completes the open handshake carries the whole session;
//! no mid-session upgrade is attempted.

pub mod engine;
pub mod polling;
pub mod websocket;

pub use engine::{Carrier, EngineConn, EnginePacket, OpenPacket, ENGINE_PROTOCOL};
pub use polling::PollingCarrier;
pub use websocket::WebSocketCarrier;

use crate::traits::error::{Result, SocketIoError};
use crate::traits::transport::{DialOptions, Dialer, TransportConn, TransportKind};
use async_trait::async_trait;
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Default bound on a single candidate's open handshake
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(20);

/// Dials Engine.IO sessions over polling or WebSocket
#[derive(Debug, Clone)]
pub struct EngineDialer {
    handshake_timeout: Duration,
}

impl Default for EngineDialer {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineDialer {
    pub fn new() -> Self {
        Self {
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    async fn dial_candidate(
        &self,
        kind: TransportKind,
        url: &Url,
        options: &DialOptions,
    ) -> Result<Arc<dyn TransportConn>> {
        let url = engine_url(url, kind)?;

        let (carrier, open, initial) =
            tokio::time::timeout(self.handshake_timeout, handshake(kind, &url, options))
                .await
                .map_err(|_| SocketIoError::Timeout(format!("{} handshake with {}", kind, url)))??;

        let read_timeout = open.read_timeout(options.ping_interval, options.ping_timeout);
        Ok(Arc::new(EngineConn::new(&open, kind, carrier, read_timeout, initial)))
    }
}

async fn handshake(
    kind: TransportKind,
    url: &Url,
    options: &DialOptions,
) -> Result<(Box<dyn Carrier>, OpenPacket, Vec<EnginePacket>)> {
    match kind {
        TransportKind::Polling => {
            let (carrier, open, initial) = PollingCarrier::connect(url, &options.headers).await?;
            let carrier: Box<dyn Carrier> = Box::new(carrier);
            Ok((carrier, open, initial))
        }
        TransportKind::WebSocket => {
            let (carrier, open) = WebSocketCarrier::connect(url, &options.headers).await?;
            let carrier: Box<dyn Carrier> = Box::new(carrier);
            Ok((carrier, open, Vec::new()))
        }
    }
}

#[async_trait]
impl Dialer for EngineDialer {
    async fn dial(&self, url: &Url, options: &DialOptions) -> Result<Arc<dyn TransportConn>> {
        let candidates = if options.transports.is_empty() {
            TransportKind::defaults()
        } else {
            options.transports.clone()
        };

        let mut last_error = None;
        for kind in candidates {
            match self.dial_candidate(kind, url, options).await {
                Ok(conn) => {
                    info!("Negotiated {} transport with {}", kind, url);
                    return Ok(conn);
                }
                Err(e) => {
                    warn!("{} transport failed for {}: {}", kind, url, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| SocketIoError::Transport("no transport candidates".to_string())))
    }
}

/// Handshake URL for one candidate
///
/// Adds `EIO` and `transport` to the query and switches the scheme to
/// `ws`/`wss` for WebSocket.
pub fn engine_url(url: &Url, kind: TransportKind) -> Result<Url> {
    let mut url = url.clone();

    if kind == TransportKind::WebSocket {
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(SocketIoError::InvalidUrl(format!(
                    "unsupported scheme '{}'",
                    other
                )))
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| SocketIoError::InvalidUrl(format!("cannot switch {} to {}", url, scheme)))?;
    }

    url.query_pairs_mut()
        .append_pair("EIO", &ENGINE_PROTOCOL.to_string())
        .append_pair("transport", kind.name());
    Ok(url)
}
