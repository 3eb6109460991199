//! # Core
//!
//! The protocol engine: packets and their codec, the namespace handler
//! registry, per-transport connections with their three loops, and the
//! client that dials, hands out handlers, and reconnects.
//!
//! ## Example
//!
//! ```rust,ignore
//! use socketio::{Client, ClientOptions};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> socketio::Result<()> {
//!     let client = Client::new(
//!         "http://localhost:3000/chat",
//!         ClientOptions::default()
//!             .with_reconnection_attempts(5)
//!             .with_reconnection_delay(Duration::from_millis(500)),
//!     )?;
//!
//!     client.on_connect(|conn| {
//!         println!("connected as {}", conn.id());
//!         Ok(())
//!     });
//!     client.on_event("message", |_conn, args| {
//!         println!("message: {:?}", args);
//!         Vec::new()
//!     });
//!
//!     client.connect().await?;
//!     client.emit("message", vec!["hello".into()]);
//!     Ok(())
//! }
//! ```

pub mod backoff;
pub mod broadcast;
pub mod client;
pub mod codec;
pub mod config;
pub mod connection;
pub mod connection_state;
pub mod namespace_conn;
pub mod packet;
pub mod pipeline;
pub mod registry;

// Re-export main types
pub use backoff::BackOff;
pub use broadcast::Broadcast;
pub use client::{Client, ClientEvent};
pub use config::ClientOptions;
pub use connection::Connection;
pub use connection_state::{AtomicConnectionState, ConnectionState};
pub use namespace_conn::NamespaceConn;
pub use packet::{Header, Packet, PacketType, Payload};
pub use registry::{NamespaceHandler, NamespaceHandlers};
