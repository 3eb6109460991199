//! HTTP long-polling carrier
//!
//! `GET` waits for a batch of packets, `POST` sends one. Packets in a batch
//! are separated by the record separator `\x1e`; binary messages are
//! written as `b<base64>`.

use crate::traits::error::{Result, SocketIoError};
use crate::traits::headers::Headers;
use crate::traits::transport::Frame;
use crate::transport::engine::{Carrier, EnginePacket, OpenPacket};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Url;
use tracing::{debug, warn};

/// Separator between packets of one polling payload
pub const RECORD_SEPARATOR: char = '\x1e';

pub struct PollingCarrier {
    http: reqwest::Client,
    url: Url,
}

impl PollingCarrier {
    /// Run the polling handshake
    ///
    /// `url` carries `EIO` and `transport`; the session id is appended once
    /// the server assigns it. Packets delivered together with the open
    /// packet are returned alongside it.
    pub async fn connect(url: &Url, headers: &Headers) -> Result<(Self, OpenPacket, Vec<EnginePacket>)> {
        let http = reqwest::Client::builder()
            .default_headers(header_map(headers))
            .build()
            .map_err(|e| SocketIoError::Transport(format!("http client: {}", e)))?;

        debug!("Polling handshake with {}", url);
        let mut packets = get(&http, url).await?.into_iter();

        let open = match packets.next() {
            Some(EnginePacket::Open(open)) => *open,
            other => {
                return Err(SocketIoError::Transport(format!(
                    "expected open packet, got {:?}",
                    other
                )))
            }
        };

        let mut session_url = url.clone();
        session_url.query_pairs_mut().append_pair("sid", &open.sid);

        Ok((
            Self {
                http,
                url: session_url,
            },
            open,
            packets.collect(),
        ))
    }
}

fn header_map(headers: &Headers) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (key, value) in headers {
        match (key.parse::<HeaderName>(), value.parse::<HeaderValue>()) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            (Err(_), _) => warn!("Invalid header name: {}", key),
            (_, Err(_)) => warn!("Invalid header value for key '{}': {}", key, value),
        }
    }
    map
}

async fn get(http: &reqwest::Client, url: &Url) -> Result<Vec<EnginePacket>> {
    let response = http
        .get(url.clone())
        .send()
        .await
        .map_err(|e| SocketIoError::Transport(format!("poll failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(SocketIoError::Transport(format!("poll returned {}", status)));
    }

    let body = response
        .text()
        .await
        .map_err(|e| SocketIoError::Transport(format!("poll body: {}", e)))?;
    decode_payload(&body)
}

/// Split a polling payload into packets
pub fn decode_payload(body: &str) -> Result<Vec<EnginePacket>> {
    body.split(RECORD_SEPARATOR)
        .filter(|record| !record.is_empty())
        .map(|record| match record.strip_prefix('b') {
            Some(encoded) => STANDARD
                .decode(encoded)
                .map(|data| EnginePacket::Message(Frame::Binary(data)))
                .map_err(|e| SocketIoError::Decode(format!("invalid base64 record: {}", e))),
            None => EnginePacket::parse(record),
        })
        .collect()
}

/// Join packets into one polling payload
pub fn encode_payload(packets: &[EnginePacket]) -> Result<String> {
    let records = packets
        .iter()
        .map(|packet| match packet {
            EnginePacket::Message(Frame::Binary(data)) => Ok(format!("b{}", STANDARD.encode(data))),
            other => other.encode_text(),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(records.join(&RECORD_SEPARATOR.to_string()))
}

#[async_trait]
impl Carrier for PollingCarrier {
    async fn receive(&self) -> Result<Vec<EnginePacket>> {
        get(&self.http, &self.url).await
    }

    async fn send(&self, packets: Vec<EnginePacket>) -> Result<()> {
        let body = encode_payload(&packets)?;
        let response = self
            .http
            .post(self.url.clone())
            .header(CONTENT_TYPE, "text/plain;charset=UTF-8")
            .body(body)
            .send()
            .await
            .map_err(|e| SocketIoError::Transport(format!("post failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SocketIoError::Transport(format!("post returned {}", status)));
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if let Err(e) = self.send(vec![EnginePacket::Close]).await {
            debug!("Failed to send engine close: {}", e);
        }
        Ok(())
    }
}
