//! CLI utilities for binaries
//!
//! Client settings come from environment variables, with the server
//! address optionally given as the first argument.

use anyhow::{anyhow, Context, Result};
use socketio::{ClientOptions, TransportKind};
use std::time::Duration;

/// Server address used when nothing else is given
pub const DEFAULT_URL: &str = "http://127.0.0.1:8082";

/// Event the demo subscribes to when `SOCKETIO_EVENT` is unset
pub const DEFAULT_EVENT: &str = "TASK_MANAGER_ASSIGN";

/// Settings for the demo client
#[derive(Debug, Clone)]
pub struct DemoConfig {
    pub url: String,
    pub event: String,
    pub transports: Vec<TransportKind>,
    pub reconnection_attempts: u32,
    pub ping_interval: Option<Duration>,
    pub ping_timeout: Option<Duration>,
}

impl DemoConfig {
    /// Read settings from the process environment
    ///
    /// # Environment
    /// * `SOCKETIO_URL` - server address (overridden by the first argument)
    /// * `SOCKETIO_EVENT` - event name to subscribe to
    /// * `SOCKETIO_TRANSPORTS` - comma-separated list, e.g. `websocket,polling`
    /// * `SOCKETIO_RECONNECT_ATTEMPTS` - 0 retries forever
    /// * `SOCKETIO_PING_INTERVAL_MS` / `SOCKETIO_PING_TIMEOUT_MS`
    pub fn from_env() -> Result<Self> {
        let mut config = Self::from_lookup(|key| std::env::var(key).ok())?;
        if let Some(url) = parse_args().into_iter().next() {
            config.url = url;
        }
        Ok(config)
    }

    /// Build settings from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let transports = match lookup("SOCKETIO_TRANSPORTS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(|name| name.parse::<TransportKind>().map_err(|e| anyhow!(e)))
                .collect::<Result<Vec<_>>>()?,
            None => vec![TransportKind::WebSocket],
        };

        let reconnection_attempts = match lookup("SOCKETIO_RECONNECT_ATTEMPTS") {
            Some(value) => value
                .parse()
                .with_context(|| format!("invalid SOCKETIO_RECONNECT_ATTEMPTS '{}'", value))?,
            None => 3,
        };

        Ok(Self {
            url: lookup("SOCKETIO_URL").unwrap_or_else(|| DEFAULT_URL.to_string()),
            event: lookup("SOCKETIO_EVENT").unwrap_or_else(|| DEFAULT_EVENT.to_string()),
            transports,
            reconnection_attempts,
            ping_interval: millis(&lookup, "SOCKETIO_PING_INTERVAL_MS")?,
            ping_timeout: millis(&lookup, "SOCKETIO_PING_TIMEOUT_MS")?,
        })
    }

    /// Client options for these settings
    pub fn client_options(&self) -> ClientOptions {
        let mut options = ClientOptions::default()
            .with_transports(self.transports.clone())
            .with_reconnection(true)
            .with_reconnection_attempts(self.reconnection_attempts);

        if let Some(interval) = self.ping_interval {
            options = options.with_ping_interval(interval);
        }
        if let Some(timeout) = self.ping_timeout {
            options = options.with_ping_timeout(timeout);
        }
        options
    }
}

fn millis<F>(lookup: &F, key: &str) -> Result<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| {
            value
                .parse::<u64>()
                .map(Duration::from_millis)
                .with_context(|| format!("invalid {} '{}'", key, value))
        })
        .transpose()
}

/// Parse command line arguments for a binary
///
/// Returns a vector of arguments (excluding the program name)
pub fn parse_args() -> Vec<String> {
    std::env::args().skip(1).collect()
}
