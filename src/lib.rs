//! Socket.IO client - main library
//!
//! Re-exports the `socketio` workspace library and carries the helpers
//! shared by the binaries.
//!
//! ## Usage in Binaries
//!
//! ```rust,ignore
//! use socketio_client::bin_common::{init_tracing, DemoConfig};
//! use socketio_client::Client;
//! ```

// Re-export workspace libraries for convenience
pub use socketio;
pub use socketio::{Client, ClientEvent, ClientOptions, NamespaceConn, SocketIoError, TransportKind};

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod runner;

    pub use cli::{parse_args, DemoConfig};
    pub use runner::{init_tracing, print_banner, print_shutdown};
}
