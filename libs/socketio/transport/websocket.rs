//! WebSocket carrier
//!
//! One Engine.IO packet per WebSocket message. Binary attachments travel
//! as raw binary messages.

use crate::traits::error::{Result, SocketIoError};
use crate::traits::headers::Headers;
use crate::traits::transport::Frame;
use crate::transport::engine::{Carrier, EnginePacket, OpenPacket};
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{http, Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WebSocketCarrier {
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl WebSocketCarrier {
    /// Connect and wait for the server's open packet
    pub async fn connect(url: &Url, headers: &Headers) -> Result<(Self, OpenPacket)> {
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| SocketIoError::InvalidUrl(e.to_string()))?;

        for (key, value) in headers {
            match (
                key.parse::<http::header::HeaderName>(),
                value.parse::<http::header::HeaderValue>(),
            ) {
                (Ok(name), Ok(value)) => {
                    request.headers_mut().insert(name, value);
                }
                (Err(_), _) => warn!("Invalid header name: {}", key),
                (_, Err(_)) => warn!("Invalid header value for key '{}': {}", key, value),
            }
        }

        debug!("Opening websocket to {}", url);
        let (ws_stream, _) = connect_async(request)
            .await
            .map_err(|e| SocketIoError::Transport(format!("websocket connect failed: {}", e)))?;
        let (sink, stream) = ws_stream.split();

        let carrier = Self {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        };

        let packets = carrier.receive().await?;
        match packets.into_iter().next() {
            Some(EnginePacket::Open(open)) => Ok((carrier, *open)),
            other => Err(SocketIoError::Transport(format!(
                "expected open packet, got {:?}",
                other
            ))),
        }
    }
}

fn to_message(packet: EnginePacket) -> Result<Message> {
    match packet {
        EnginePacket::Message(Frame::Binary(data)) => Ok(Message::Binary(data)),
        other => other.encode_text().map(Message::Text),
    }
}

#[async_trait]
impl Carrier for WebSocketCarrier {
    async fn receive(&self) -> Result<Vec<EnginePacket>> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return EnginePacket::parse(&text).map(|p| vec![p]),
                Some(Ok(Message::Binary(data))) => {
                    return Ok(vec![EnginePacket::Message(Frame::Binary(data))])
                }
                Some(Ok(Message::Close(_))) => return Ok(vec![EnginePacket::Close]),
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Err(e)) => return Err(SocketIoError::Transport(e.to_string())),
                None => {
                    return Err(SocketIoError::ConnectionClosed(
                        "websocket stream ended".to_string(),
                    ))
                }
            }
        }
    }

    async fn send(&self, packets: Vec<EnginePacket>) -> Result<()> {
        let mut sink = self.sink.lock().await;
        for packet in packets {
            sink.send(to_message(packet)?)
                .await
                .map_err(|e| SocketIoError::Transport(e.to_string()))?;
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut sink = self.sink.lock().await;
        if let Err(e) = sink.send(Message::Text("1".to_string())).await {
            debug!("Failed to send engine close: {}", e);
        }
        match sink.close().await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(SocketIoError::Transport(e.to_string())),
        }
    }
}
