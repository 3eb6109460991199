//! # socketio
//!
//! An event-based Socket.IO client: an Engine.IO transport underneath and a
//! namespace-multiplexing packet layer on top.
//!
//! ## Features
//!
//! - **Namespace multiplexing**: one transport connection, per-namespace handlers
//! - **Three-loop pipeline**: read, write and error loops per connection, all
//!   stopped by a single close-once termination signal
//! - **Reconnection**: exponential backoff with jitter, one sequence at a time
//! - **Handlers survive reconnects**: the registry is owned by the client, not
//!   by the connection
//! - **Pluggable transport**: anything implementing [`Dialer`] can stand in for
//!   the bundled Engine.IO dialer

pub mod traits;
pub mod core;
pub mod transport;

// Re-export all traits
pub use self::traits::*;

// Re-export core client functionality
pub use self::core::{
    backoff, broadcast, client, codec, config, connection, connection_state, namespace_conn,
    packet, pipeline, registry,
    backoff::BackOff,
    broadcast::Broadcast,
    client::{Client, ClientEvent},
    config::ClientOptions,
    connection::Connection,
    connection_state::{AtomicConnectionState, ConnectionState},
    namespace_conn::NamespaceConn,
    packet::{canonical_namespace, Header, Packet, PacketType, Payload, ALIAS_ROOT_NAMESPACE, ROOT_NAMESPACE},
    registry::{NamespaceHandler, NamespaceHandlers},
};

// Re-export the bundled transport
pub use self::transport::{EngineConn, EngineDialer};

pub use reqwest::Url;

/// Type alias for Result with SocketIoError
pub type Result<T> = std::result::Result<T, traits::SocketIoError>;
