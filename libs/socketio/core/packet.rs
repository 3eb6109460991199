//! Packet model
//!
//! The logical shape of a Socket.IO packet. The codec turns these into
//! frames and back; everything else in the engine works on this shape.

use serde_json::Value;
use std::fmt;

/// Canonical identifier of the root namespace
pub const ROOT_NAMESPACE: &str = "";

/// Literal alias of the root namespace as it appears in URLs and on the wire
pub const ALIAS_ROOT_NAMESPACE: &str = "/";

/// Rewrite a namespace into its canonical form
///
/// The root alias becomes [`ROOT_NAMESPACE`] and any leading slash is
/// dropped, so `"/"`, `""` and `"/chat"`/`"chat"` each collapse to one
/// identifier. Applying it twice gives the same result as applying it once.
pub fn canonical_namespace(namespace: &str) -> String {
    if namespace == ALIAS_ROOT_NAMESPACE {
        return ROOT_NAMESPACE.to_string();
    }
    namespace.strip_prefix('/').unwrap_or(namespace).to_string()
}

/// Socket.IO packet types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    Connect = 0,
    Disconnect = 1,
    Event = 2,
    Ack = 3,
    ConnectError = 4,
    BinaryEvent = 5,
    BinaryAck = 6,
}

impl PacketType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(PacketType::Connect),
            1 => Some(PacketType::Disconnect),
            2 => Some(PacketType::Event),
            3 => Some(PacketType::Ack),
            4 => Some(PacketType::ConnectError),
            5 => Some(PacketType::BinaryEvent),
            6 => Some(PacketType::BinaryAck),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether binary attachments follow the text frame
    pub fn is_binary(self) -> bool {
        matches!(self, PacketType::BinaryEvent | PacketType::BinaryAck)
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PacketType::Connect => "CONNECT",
            PacketType::Disconnect => "DISCONNECT",
            PacketType::Event => "EVENT",
            PacketType::Ack => "ACK",
            PacketType::ConnectError => "CONNECT_ERROR",
            PacketType::BinaryEvent => "BINARY_EVENT",
            PacketType::BinaryAck => "BINARY_ACK",
        };
        f.write_str(name)
    }
}

/// Packet header: type, target namespace, optional ack id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub packet_type: PacketType,
    pub namespace: String,
    pub id: Option<u64>,
}

impl Header {
    /// Create a header; the namespace is canonicalized
    pub fn new(packet_type: PacketType, namespace: &str) -> Self {
        Self {
            packet_type,
            namespace: canonical_namespace(namespace),
            id: None,
        }
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }
}

/// Packet body
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// No body (disconnect, bare connect)
    None,
    /// Named event with arguments
    Event { name: String, args: Vec<Value> },
    /// Acknowledgement arguments
    Ack(Vec<Value>),
    /// Free-form body (connect auth, connect-error reason)
    Data(Value),
}

/// A header plus its payload
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub header: Header,
    pub payload: Payload,
    /// Binary attachments, in placeholder order
    pub attachments: Vec<Vec<u8>>,
}

impl Packet {
    pub fn new(header: Header, payload: Payload) -> Self {
        Self {
            header,
            payload,
            attachments: Vec::new(),
        }
    }

    pub fn connect(namespace: &str) -> Self {
        Self::new(Header::new(PacketType::Connect, namespace), Payload::None)
    }

    pub fn disconnect(namespace: &str) -> Self {
        Self::new(Header::new(PacketType::Disconnect, namespace), Payload::None)
    }

    pub fn event(namespace: &str, name: impl Into<String>, args: Vec<Value>) -> Self {
        Self::new(
            Header::new(PacketType::Event, namespace),
            Payload::Event {
                name: name.into(),
                args,
            },
        )
    }

    pub fn ack(namespace: &str, id: u64, args: Vec<Value>) -> Self {
        Self::new(
            Header::new(PacketType::Ack, namespace).with_id(id),
            Payload::Ack(args),
        )
    }

    /// Event name, for event packets
    pub fn event_name(&self) -> Option<&str> {
        match &self.payload {
            Payload::Event { name, .. } => Some(name),
            _ => None,
        }
    }
}
