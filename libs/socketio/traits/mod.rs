//! # Traits
//!
//! Core traits and types shared by the client engine and its collaborators:
//!
//! - **SocketIoError**: the error taxonomy
//! - **Dialer / TransportConn**: the seam to the byte transport
//! - **HeaderProvider**: per-dial handshake headers
//! - **EventHandler**: typed handlers for named events

pub mod error;
pub mod handler;
pub mod headers;
pub mod transport;

// Re-export commonly used types
pub use error::{NamespaceError, Result, SocketIoError};
pub use handler::{
    AckCallback, ConnectCallback, DisconnectCallback, ErrorCallback, EventHandler, FnHandler,
};
pub use headers::{HeaderProvider, Headers, NoHeaders};
pub use transport::{DialOptions, Dialer, Frame, TransportConn, TransportKind};
