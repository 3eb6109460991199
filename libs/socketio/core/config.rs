use crate::traits::headers::{HeaderProvider, Headers};
use crate::traits::transport::{DialOptions, TransportKind};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default capacity of a connection's outbound write queue
pub const DEFAULT_WRITE_QUEUE_CAPACITY: usize = 64;

/// Default capacity of a connection's error queue
pub const DEFAULT_ERROR_QUEUE_CAPACITY: usize = 32;

/// Options recognized by [`Client`](crate::core::client::Client)
///
/// Built with chained `with_*` setters on top of [`Default`]:
///
/// ```ignore
/// let options = ClientOptions::default()
///     .with_transports(vec![TransportKind::WebSocket])
///     .with_reconnection_attempts(10)
///     .with_reconnection_delay_max(Duration::from_secs(30));
/// ```
#[derive(Clone)]
pub struct ClientOptions {
    /// Ordered transport candidates; empty means [`TransportKind::defaults`]
    pub transports: Vec<TransportKind>,

    /// Whether a disconnect triggers the reconnect sequence
    pub reconnection: bool,

    /// Base delay before the first reconnect attempt
    pub reconnection_delay: Duration,

    /// Ceiling for the reconnect delay
    pub reconnection_delay_max: Duration,

    /// Attempt ceiling; `None` or `Some(0)` means unbounded
    pub reconnection_attempts: Option<u32>,

    /// Static headers for every handshake
    pub headers: Headers,

    /// Dynamic headers, resolved on every dial and merged over `headers`
    pub header_provider: Option<Arc<dyn HeaderProvider>>,

    /// Passed through to the transport
    pub ping_timeout: Option<Duration>,

    /// Passed through to the transport
    pub ping_interval: Option<Duration>,

    pub write_queue_capacity: usize,
    pub error_queue_capacity: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            transports: TransportKind::defaults(),
            reconnection: true,
            reconnection_delay: Duration::from_secs(1),
            reconnection_delay_max: Duration::from_secs(5),
            reconnection_attempts: None,
            headers: Headers::new(),
            header_provider: None,
            ping_timeout: None,
            ping_interval: None,
            write_queue_capacity: DEFAULT_WRITE_QUEUE_CAPACITY,
            error_queue_capacity: DEFAULT_ERROR_QUEUE_CAPACITY,
        }
    }
}

impl ClientOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transports(mut self, transports: Vec<TransportKind>) -> Self {
        self.transports = transports;
        self
    }

    pub fn with_reconnection(mut self, enabled: bool) -> Self {
        self.reconnection = enabled;
        self
    }

    pub fn with_reconnection_delay(mut self, delay: Duration) -> Self {
        self.reconnection_delay = delay;
        self
    }

    pub fn with_reconnection_delay_max(mut self, max: Duration) -> Self {
        self.reconnection_delay_max = max;
        self
    }

    pub fn with_reconnection_attempts(mut self, attempts: u32) -> Self {
        self.reconnection_attempts = Some(attempts);
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_header_provider(mut self, provider: Arc<dyn HeaderProvider>) -> Self {
        self.header_provider = Some(provider);
        self
    }

    pub fn with_ping_timeout(mut self, timeout: Duration) -> Self {
        self.ping_timeout = Some(timeout);
        self
    }

    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = Some(interval);
        self
    }

    pub fn with_write_queue_capacity(mut self, capacity: usize) -> Self {
        self.write_queue_capacity = capacity;
        self
    }

    pub fn with_error_queue_capacity(mut self, capacity: usize) -> Self {
        self.error_queue_capacity = capacity;
        self
    }

    /// Resolved attempt ceiling; `None` means unbounded
    pub fn max_reconnection_attempts(&self) -> Option<u32> {
        self.reconnection_attempts.filter(|&attempts| attempts > 0)
    }

    /// Transport candidates actually dialed
    pub fn candidates(&self) -> Vec<TransportKind> {
        if self.transports.is_empty() {
            TransportKind::defaults()
        } else {
            self.transports.clone()
        }
    }

    /// Dial options for the next attempt, with dynamic headers resolved
    pub async fn dial_options(&self) -> DialOptions {
        let mut headers = self.headers.clone();
        if let Some(provider) = &self.header_provider {
            headers.extend(provider.get_headers().await);
        }

        DialOptions {
            transports: self.candidates(),
            headers,
            ping_timeout: self.ping_timeout,
            ping_interval: self.ping_interval,
        }
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("transports", &self.transports)
            .field("reconnection", &self.reconnection)
            .field("reconnection_delay", &self.reconnection_delay)
            .field("reconnection_delay_max", &self.reconnection_delay_max)
            .field("reconnection_attempts", &self.reconnection_attempts)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("header_provider", &self.header_provider.is_some())
            .field("ping_timeout", &self.ping_timeout)
            .field("ping_interval", &self.ping_interval)
            .finish()
    }
}
