//! The three per-connection loops
//!
//! ```text
//!              ┌──────────── termination token ────────────┐
//!              ▼                     ▼                      ▼
//!   transport ──> read loop     write queue ──> write loop ──> transport
//!                   │ dispatch
//!                   ▼
//!             error queue ──> error loop ──> on_error
//! ```
//!
//! The read loop is fail-fast: a decode or dispatch failure ends the
//! connection. The write loop contains encode failures and keeps going.
//! Every loop closes the connection on exit.

use crate::core::client::ClientEvent;
use crate::core::connection::Connection;
use crate::core::packet::{Packet, PacketType, Payload};
use crate::traits::error::{NamespaceError, Result, SocketIoError};
use crossbeam_channel::Sender;
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Disconnect reason when the server sent a Disconnect packet
pub const REASON_SERVER_DISCONNECT: &str = "io server disconnect";
/// Disconnect reason when the transport failed or went silent
pub const REASON_TRANSPORT_ERROR: &str = "transport error";
/// Disconnect reason when the inbound stream could not be trusted
pub const REASON_PARSE_ERROR: &str = "parse error";

/// Start the error, write and read loops for a connection
pub fn spawn(
    conn: Arc<Connection>,
    namespace: String,
    events: Sender<ClientEvent>,
) -> Vec<JoinHandle<()>> {
    info!("Starting pipeline for connection {} (namespace '{}')", conn.id(), namespace);

    vec![
        tokio::spawn(error_loop(Arc::clone(&conn), events.clone())),
        tokio::spawn(write_loop(Arc::clone(&conn))),
        tokio::spawn(read_loop(conn, namespace, events)),
    ]
}

enum Flow {
    Continue,
    Disconnected,
}

async fn read_loop(conn: Arc<Connection>, namespace: String, events: Sender<ClientEvent>) {
    let quit = conn.terminated();

    let reason = loop {
        let decoded = tokio::select! {
            biased;
            _ = quit.cancelled() => {
                debug!("Read loop on {} stopped", conn.id());
                return;
            }
            decoded = conn.decode() => decoded,
        };

        let packet = match decoded {
            Ok(packet) => packet,
            Err(e) => {
                if conn.is_terminated() {
                    debug!("Read loop on {} stopped after local close", conn.id());
                    return;
                }
                error!("Read error on connection {}: {}", conn.id(), e);
                let reason = match e {
                    SocketIoError::Decode(_) => REASON_PARSE_ERROR,
                    _ => REASON_TRANSPORT_ERROR,
                };
                conn.on_error(&namespace, e);
                break reason;
            }
        };

        match dispatch(&conn, packet, &events) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Disconnected) => break REASON_SERVER_DISCONNECT,
            Err(e) => {
                error!("Dispatch error on connection {}: {}", conn.id(), e);
                conn.on_error(&namespace, e);
                break REASON_PARSE_ERROR;
            }
        }
    };

    close(&conn).await;
    let _ = events.send(ClientEvent::Disconnected(reason.to_string()));

    // The disconnect callback may run a full reconnect sequence
    match (conn.handler(&namespace), conn.namespace_conn(&namespace)) {
        (Some(handler), Some(ns_conn)) => {
            handler.dispatch_disconnect(ns_conn, reason.to_string()).await;
        }
        _ => debug!("No disconnect dispatch for namespace '{}'", namespace),
    }
}

fn dispatch(conn: &Arc<Connection>, packet: Packet, events: &Sender<ClientEvent>) -> Result<Flow> {
    debug!(
        "Received {} on namespace '{}' (id: {:?})",
        packet.header.packet_type, packet.header.namespace, packet.header.id
    );

    match packet.header.packet_type {
        PacketType::Connect => handle_connect(conn, packet, events).map(|_| Flow::Continue),
        PacketType::Disconnect => {
            info!("Server disconnected namespace '{}'", packet.header.namespace);
            Ok(Flow::Disconnected)
        }
        PacketType::Event => handle_event(conn, packet).map(|_| Flow::Continue),
        PacketType::Ack => handle_ack(conn, packet).map(|_| Flow::Continue),
        PacketType::ConnectError => {
            handle_connect_error(conn, packet, events);
            Ok(Flow::Continue)
        }
        PacketType::BinaryEvent | PacketType::BinaryAck => {
            debug!("Ignoring {} packet", packet.header.packet_type);
            Ok(Flow::Continue)
        }
    }
}

fn handle_connect(conn: &Arc<Connection>, packet: Packet, events: &Sender<ClientEvent>) -> Result<()> {
    let namespace = packet.header.namespace;
    let Some(handler) = conn.handler(&namespace) else {
        debug!("Connect for namespace '{}' without handler", namespace);
        return Ok(());
    };

    let ns_conn = match conn.namespace_conn(&namespace) {
        Some(ns_conn) => ns_conn,
        None => conn.bind_namespace(&namespace, &handler),
    };

    let sid = match &packet.payload {
        Payload::Data(Value::Object(map)) => map.get("sid").and_then(Value::as_str).map(String::from),
        _ => None,
    };
    ns_conn.set_sid(sid);

    if conn.mark_open() {
        info!("Namespace '{}' connected on {}", namespace, conn.id());
        let _ = events.send(ClientEvent::Connected);
    }

    if let Err(e) = handler.dispatch_connect(&ns_conn) {
        warn!("Connect handler for '{}' failed: {}", namespace, e);
        conn.on_error(&namespace, e);
    }
    Ok(())
}

fn handle_event(conn: &Arc<Connection>, packet: Packet) -> Result<()> {
    let namespace = packet.header.namespace;
    let (name, args) = match packet.payload {
        Payload::Event { name, args } => (name, args),
        other => {
            return Err(SocketIoError::Decode(format!(
                "event packet with payload {:?}",
                other
            )))
        }
    };

    let (Some(handler), Some(ns_conn)) = (conn.handler(&namespace), conn.namespace_conn(&namespace)) else {
        debug!("Event '{}' for unbound namespace '{}'", name, namespace);
        return Ok(());
    };

    let Some(event_handler) = handler.event_handler(&name) else {
        debug!("No handler for event '{}' on namespace '{}'", name, namespace);
        return Ok(());
    };

    let reply = event_handler.invoke(&ns_conn, args);

    if let Some(id) = packet.header.id {
        if let Err(e) = ns_conn.ack(id, reply) {
            warn!("Failed to queue ack {} for '{}': {}", id, name, e);
            conn.on_error(&namespace, e);
        }
    }
    Ok(())
}

fn handle_ack(conn: &Arc<Connection>, packet: Packet) -> Result<()> {
    let namespace = packet.header.namespace;
    let id = packet
        .header
        .id
        .ok_or_else(|| SocketIoError::Decode("ack packet without id".to_string()))?;
    let args = match packet.payload {
        Payload::Ack(args) => args,
        _ => Vec::new(),
    };

    match conn.namespace_conn(&namespace) {
        Some(ns_conn) => {
            ns_conn.resolve_ack(id, args);
        }
        None => debug!("Ack {} for unbound namespace '{}'", id, namespace),
    }
    Ok(())
}

fn handle_connect_error(conn: &Arc<Connection>, packet: Packet, events: &Sender<ClientEvent>) {
    let namespace = packet.header.namespace;
    let message = match packet.payload {
        Payload::Data(Value::Object(map)) => map
            .get("message")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| Value::Object(map).to_string()),
        Payload::Data(Value::String(message)) => message,
        Payload::Data(other) => other.to_string(),
        _ => "connection refused".to_string(),
    };

    warn!("Server refused namespace '{}': {}", namespace, message);
    let _ = events.send(ClientEvent::Error(message.clone()));
    conn.on_error(&namespace, SocketIoError::Handler(message));
}

async fn write_loop(conn: Arc<Connection>) {
    let Some(mut queue) = conn.take_write_rx() else {
        warn!("Write loop already running on {}", conn.id());
        return;
    };
    let quit = conn.terminated();

    loop {
        tokio::select! {
            biased;
            _ = quit.cancelled() => {
                debug!("Write loop on {} stopped", conn.id());
                break;
            }
            packet = queue.recv() => match packet {
                Some(packet) => {
                    if let Err(e) = conn.encode(&packet).await {
                        warn!(
                            "Failed to write {} on namespace '{}': {}",
                            packet.header.packet_type, packet.header.namespace, e
                        );
                        conn.on_error(&packet.header.namespace, e);
                    }
                }
                None => break,
            },
        }
    }

    close(&conn).await;
}

async fn error_loop(conn: Arc<Connection>, events: Sender<ClientEvent>) {
    let Some(mut queue) = conn.take_error_rx() else {
        warn!("Error loop already running on {}", conn.id());
        return;
    };
    let quit = conn.terminated();

    loop {
        tokio::select! {
            biased;
            Some(err) = queue.recv() => route_error(&conn, err, &events),
            _ = quit.cancelled() => {
                // Errors reported just before close still reach their handler
                while let Ok(err) = queue.try_recv() {
                    route_error(&conn, err, &events);
                }
                debug!("Error loop on {} stopped", conn.id());
                break;
            }
        }
    }

    close(&conn).await;
}

fn route_error(conn: &Connection, err: NamespaceError, events: &Sender<ClientEvent>) {
    error!("Connection {} error: {}", conn.id(), err);
    let _ = events.send(ClientEvent::Error(err.to_string()));

    let Some(handler) = conn.handler(&err.namespace) else {
        return;
    };
    let Some(ns_conn) = conn.namespace_conn(&err.namespace) else {
        return;
    };
    handler.dispatch_error(Some(&ns_conn), &err.error);
}

async fn close(conn: &Connection) {
    if let Err(e) = conn.close().await {
        error!("Failed to close connection {}: {}", conn.id(), e);
    }
}
