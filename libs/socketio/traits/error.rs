use thiserror::Error;

/// Main error type for the socketio client
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SocketIoError {
    /// Client was constructed with an empty address
    #[error("empty addr")]
    EmptyAddress,

    /// Address could not be parsed as a URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// No handler registered for the client's namespace at handshake time
    #[error("root namespace handler is unavailable")]
    UnavailableRootHandler,

    /// Transport-level failure (dial, read, write)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Connection closed, locally or by the peer
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// Inbound packet could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Outbound packet could not be encoded or written
    #[error("Encode error: {0}")]
    Encode(String),

    /// A bounded queue refused an item
    #[error("Queue full: {0}")]
    QueueFull(String),

    /// Error reported by a registered handler or by the server for a namespace
    #[error("Handler error: {0}")]
    Handler(String),

    /// Reconnect sequence gave up
    #[error("reconnect failed after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    /// Operation requires an open connection
    #[error("Not connected")]
    NotConnected,

    /// Operation timed out
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// An error scoped to the namespace it occurred on.
///
/// This is the item type of a connection's error queue.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("namespace '{namespace}': {error}")]
pub struct NamespaceError {
    pub namespace: String,
    #[source]
    pub error: SocketIoError,
}

impl NamespaceError {
    pub fn new(namespace: impl Into<String>, error: SocketIoError) -> Self {
        Self {
            namespace: namespace.into(),
            error,
        }
    }
}

/// Result type for socketio operations
pub type Result<T> = std::result::Result<T, SocketIoError>;
