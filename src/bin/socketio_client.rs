//! Demo client
//!
//! Connects to a Socket.IO server, prints one subscribed event, and keeps
//! retrying the initial connect until it succeeds or Ctrl+C is pressed.

use anyhow::Result;
use serde_json::Value;
use socketio_client::bin_common::{init_tracing, print_banner, print_shutdown, DemoConfig};
use socketio_client::{Client, ClientEvent};
use std::time::Duration;
use tracing::{error, info, warn};

const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(2);
const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("info");

    let config = DemoConfig::from_env()?;
    print_banner("Socket.IO demo client", &config.url);

    let client = Client::new(&config.url, config.client_options())?;
    register_handlers(&client, &config.event);

    tokio::select! {
        result = connect_with_retry(&client) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted before the first connect");
            print_shutdown("Socket.IO demo client");
            return Ok(());
        }
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
        _ = watch_events(&client) => {}
    }

    if let Err(e) = client.close().await {
        error!("close connect: {}", e);
    }
    print_shutdown("Socket.IO demo client");
    Ok(())
}

fn register_handlers(client: &Client, event: &str) {
    client.on_connect(|conn| {
        info!("Connected to server {}", conn.id());
        Ok(())
    });

    client.on_error(|_conn, err| {
        error!("Main Error: {}", err);
    });

    client.on_disconnect(|_conn, reason| {
        info!("Disconnected from server: {}", reason);
    });

    let name = event.to_string();
    client.on_event(event, move |_conn, args| {
        for arg in &args {
            match arg {
                Value::String(msg) => info!("{}: {}", name, msg),
                other => info!("{}: {}", name, other),
            }
        }
        Vec::new()
    });
}

/// Log client events until reconnection gives up
async fn watch_events(client: &Client) {
    loop {
        while let Some(event) = client.try_recv_event() {
            match event {
                ClientEvent::ReconnectExhausted(attempts) => {
                    warn!("Gave up after {} reconnect attempts", attempts);
                    return;
                }
                other => info!("Client event: {:?}", other),
            }
        }
        tokio::time::sleep(EVENT_POLL_INTERVAL).await;
    }
}

async fn connect_with_retry(client: &Client) -> Result<()> {
    loop {
        info!("Create new connection");
        match client.connect().await {
            Ok(()) => return Ok(()),
            Err(e) => {
                warn!("Connect failed: {}", e);
                tokio::time::sleep(CONNECT_RETRY_DELAY).await;
            }
        }
    }
}
