//! Handler abstractions
//!
//! Callbacks are stored behind `Arc<dyn ...>` so the registry can hand out
//! clones and invoke them without holding its locks.
//!
//! # Dispatch
//!
//! ```text
//! read loop ──> packet type ──> Connect    ──> ConnectCallback
//!                          ├──> Disconnect ──> DisconnectCallback (async)
//!                          ├──> Event      ──> EventHandler by event name
//!                          └──> Ack        ──> AckCallback by ack id
//! error loop ───────────────────────────────> ErrorCallback
//! ```
//!
//! Every callback runs on the loop that observed the packet, so dispatch
//! within one connection is strictly sequential.

use crate::core::namespace_conn::NamespaceConn;
use crate::traits::error::{Result, SocketIoError};
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;

/// Called when the server confirms a namespace connection
pub type ConnectCallback = Arc<dyn Fn(&NamespaceConn) -> Result<()> + Send + Sync>;

/// Called with the namespace connection and a reason string
///
/// Asynchronous so the client can run its reconnect sequence before the
/// user's callback.
pub type DisconnectCallback =
    Arc<dyn Fn(Arc<NamespaceConn>, String) -> BoxFuture<'static, ()> + Send + Sync>;

/// Called for errors scoped to a namespace
///
/// The connection is `None` when the error happened before a namespace
/// connection existed (failed handshake, exhausted reconnect).
pub type ErrorCallback = Arc<dyn Fn(Option<&NamespaceConn>, &SocketIoError) + Send + Sync>;

/// One-shot callback for an acknowledged emit
pub type AckCallback = Box<dyn FnOnce(Vec<Value>) + Send>;

/// Handler for one named event
///
/// The returned values are sent back as the acknowledgement when the
/// server asked for one, and dropped otherwise.
///
/// # Example
///
/// ```ignore
/// struct Echo;
///
/// impl EventHandler for Echo {
///     fn invoke(&self, _conn: &NamespaceConn, args: Vec<Value>) -> Vec<Value> {
///         args
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync + 'static {
    fn invoke(&self, conn: &NamespaceConn, args: Vec<Value>) -> Vec<Value>;
}

/// Adapts a closure into an [`EventHandler`]
pub struct FnHandler<F>(pub F);

impl<F> EventHandler for FnHandler<F>
where
    F: Fn(&NamespaceConn, Vec<Value>) -> Vec<Value> + Send + Sync + 'static,
{
    fn invoke(&self, conn: &NamespaceConn, args: Vec<Value>) -> Vec<Value> {
        (self.0)(conn, args)
    }
}
