//! Socket.IO packet codec
//!
//! Text encoding (protocol v5):
//!
//! ```text
//! <type>[<attachments>-][/<namespace>,][<ack id>][<json>]
//!
//! 0                      connect, root namespace
//! 0/chat,                connect, namespace "chat"
//! 2["message","hi"]      event
//! 2/chat,13["ping"]      event on "chat" expecting ack 13
//! 3/chat,13["pong"]      ack 13 on "chat"
//! 51-["upload",{"_placeholder":true,"num":0}]   + 1 binary frame
//! ```
//!
//! The root namespace is never written; non-root namespaces are written
//! with their leading slash and stripped again on decode.

use crate::core::packet::{canonical_namespace, Header, Packet, PacketType, Payload, ROOT_NAMESPACE};
use crate::traits::error::{Result, SocketIoError};
use crate::traits::transport::{Frame, TransportConn};
use serde_json::Value;
use std::sync::Arc;

/// Encode a packet into the frames that carry it
pub fn encode_packet(packet: &Packet) -> Result<Vec<Frame>> {
    let header = &packet.header;
    let ty = header.packet_type;

    if !ty.is_binary() && !packet.attachments.is_empty() {
        return Err(SocketIoError::Encode(format!(
            "{} packet cannot carry binary attachments",
            ty
        )));
    }

    let mut text = String::with_capacity(32);
    text.push(char::from(b'0' + ty.as_u8()));

    if ty.is_binary() {
        text.push_str(&packet.attachments.len().to_string());
        text.push('-');
    }

    let namespace = canonical_namespace(&header.namespace);
    if namespace != ROOT_NAMESPACE {
        if namespace.contains(',') {
            return Err(SocketIoError::Encode(format!(
                "namespace '{}' contains ','",
                namespace
            )));
        }
        text.push('/');
        text.push_str(&namespace);
        text.push(',');
    }

    if let Some(id) = header.id {
        text.push_str(&id.to_string());
    }

    if let Some(body) = encode_body(ty, &packet.payload)? {
        text.push_str(&body);
    }

    let mut frames = Vec::with_capacity(1 + packet.attachments.len());
    frames.push(Frame::Text(text));
    frames.extend(packet.attachments.iter().cloned().map(Frame::Binary));
    Ok(frames)
}

fn encode_body(ty: PacketType, payload: &Payload) -> Result<Option<String>> {
    let value = match (ty, payload) {
        (PacketType::Connect | PacketType::Disconnect, Payload::None) => return Ok(None),
        (PacketType::Connect | PacketType::ConnectError, Payload::Data(data)) => data.clone(),
        (PacketType::Event | PacketType::BinaryEvent, Payload::Event { name, args }) => {
            let mut items = Vec::with_capacity(args.len() + 1);
            items.push(Value::String(name.clone()));
            items.extend(args.iter().cloned());
            Value::Array(items)
        }
        (PacketType::Ack | PacketType::BinaryAck, Payload::Ack(args)) => Value::Array(args.clone()),
        (ty, payload) => {
            return Err(SocketIoError::Encode(format!(
                "{} packet cannot carry payload {:?}",
                ty, payload
            )))
        }
    };

    serde_json::to_string(&value)
        .map(Some)
        .map_err(|e| SocketIoError::Encode(e.to_string()))
}

/// Decode the text frame of a packet
///
/// Returns the packet (attachments not yet filled) and the number of
/// binary frames that must follow it.
pub fn decode_text(text: &str) -> Result<(Packet, usize)> {
    let bytes = text.as_bytes();
    let first = *bytes.first().ok_or_else(|| decode_error("empty packet"))?;
    let packet_type = first
        .checked_sub(b'0')
        .and_then(PacketType::from_u8)
        .ok_or_else(|| decode_error(format!("unknown packet type '{}'", char::from(first))))?;

    let mut pos = 1;

    let mut attachments = 0usize;
    if packet_type.is_binary() {
        let end = text[pos..]
            .find('-')
            .map(|offset| pos + offset)
            .ok_or_else(|| decode_error("binary packet without attachment count"))?;
        attachments = text[pos..end]
            .parse()
            .map_err(|_| decode_error(format!("invalid attachment count '{}'", &text[pos..end])))?;
        pos = end + 1;
    }

    let mut namespace = ROOT_NAMESPACE;
    if bytes.get(pos) == Some(&b'/') {
        match text[pos..].find(',') {
            Some(offset) => {
                namespace = &text[pos..pos + offset];
                pos += offset + 1;
            }
            None => {
                namespace = &text[pos..];
                pos = text.len();
            }
        }
    }

    let digits = bytes[pos..].iter().take_while(|b| b.is_ascii_digit()).count();
    let id = if digits > 0 {
        let raw = &text[pos..pos + digits];
        Some(
            raw.parse::<u64>()
                .map_err(|_| decode_error(format!("invalid ack id '{}'", raw)))?,
        )
    } else {
        None
    };
    pos += digits;

    let body = &text[pos..];
    let data: Option<Value> = if body.is_empty() {
        None
    } else {
        Some(
            serde_json::from_str(body)
                .map_err(|e| decode_error(format!("invalid JSON payload: {}", e)))?,
        )
    };

    let payload = decode_payload(packet_type, data)?;
    let header = Header {
        packet_type,
        namespace: canonical_namespace(namespace),
        id,
    };

    Ok((Packet::new(header, payload), attachments))
}

fn decode_payload(ty: PacketType, data: Option<Value>) -> Result<Payload> {
    match ty {
        PacketType::Connect | PacketType::ConnectError => {
            Ok(data.map(Payload::Data).unwrap_or(Payload::None))
        }
        PacketType::Disconnect => Ok(Payload::None),
        PacketType::Event | PacketType::BinaryEvent => {
            let mut items = match data {
                Some(Value::Array(items)) if !items.is_empty() => items,
                _ => return Err(decode_error("event payload must be a non-empty array")),
            };
            match items.remove(0) {
                Value::String(name) => Ok(Payload::Event { name, args: items }),
                _ => Err(decode_error("event name must be a string")),
            }
        }
        PacketType::Ack | PacketType::BinaryAck => match data {
            Some(Value::Array(items)) => Ok(Payload::Ack(items)),
            None => Ok(Payload::Ack(Vec::new())),
            Some(_) => Err(decode_error("ack payload must be an array")),
        },
    }
}

fn decode_error(message: impl Into<String>) -> SocketIoError {
    SocketIoError::Decode(message.into())
}

/// Encoder bound to one transport connection
pub struct Encoder {
    transport: Arc<dyn TransportConn>,
}

impl Encoder {
    pub fn new(transport: Arc<dyn TransportConn>) -> Self {
        Self { transport }
    }

    /// Encode a packet and write all of its frames
    pub async fn encode(&self, packet: &Packet) -> Result<()> {
        for frame in encode_packet(packet)? {
            self.transport.write_frame(frame).await?;
        }
        Ok(())
    }
}

/// Decoder bound to one transport connection
pub struct Decoder {
    transport: Arc<dyn TransportConn>,
}

impl Decoder {
    pub fn new(transport: Arc<dyn TransportConn>) -> Self {
        Self { transport }
    }

    /// Read one complete packet, including its binary attachments
    pub async fn decode(&self) -> Result<Packet> {
        let text = match self.transport.read_frame().await? {
            Frame::Text(text) => text,
            Frame::Binary(_) => return Err(decode_error("binary frame without a packet header")),
        };

        let (mut packet, expected) = decode_text(&text)?;
        while packet.attachments.len() < expected {
            match self.transport.read_frame().await? {
                Frame::Binary(data) => packet.attachments.push(data),
                Frame::Text(_) => {
                    return Err(decode_error(format!(
                        "expected {} binary attachments, got {}",
                        expected,
                        packet.attachments.len()
                    )))
                }
            }
        }

        Ok(packet)
    }
}
