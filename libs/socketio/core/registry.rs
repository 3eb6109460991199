//! Namespace handler registry
//!
//! Handlers are registered against a namespace name, independent of any
//! live connection. The registry is owned by the client and shared with
//! every connection it creates, so handlers survive reconnects.
//!
//! Entries are never removed; `set` replaces, `get_or_create` inserts once.

use crate::core::broadcast::Broadcast;
use crate::core::namespace_conn::NamespaceConn;
use crate::traits::error::{Result, SocketIoError};
use crate::traits::handler::{
    ConnectCallback, DisconnectCallback, ErrorCallback, EventHandler, FnHandler,
};
use futures::FutureExt;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Callbacks registered for one namespace
pub struct NamespaceHandler {
    name: String,
    broadcast: Arc<Broadcast>,
    on_connect: RwLock<Option<ConnectCallback>>,
    on_disconnect: RwLock<Option<DisconnectCallback>>,
    on_error: RwLock<Option<ErrorCallback>>,
    events: RwLock<HashMap<String, Arc<dyn EventHandler>>>,
}

impl NamespaceHandler {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            broadcast: Arc::new(Broadcast::new()),
            on_connect: RwLock::new(None),
            on_disconnect: RwLock::new(None),
            on_error: RwLock::new(None),
            events: RwLock::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Room membership shared with every connection of this namespace
    pub fn broadcast(&self) -> &Arc<Broadcast> {
        &self.broadcast
    }

    pub fn on_connect<F>(&self, f: F)
    where
        F: Fn(&NamespaceConn) -> Result<()> + Send + Sync + 'static,
    {
        *self.on_connect.write() = Some(Arc::new(f));
    }

    /// Register a synchronous disconnect callback
    pub fn on_disconnect<F>(&self, f: F)
    where
        F: Fn(&NamespaceConn, &str) + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.set_disconnect_callback(Arc::new(move |conn: Arc<NamespaceConn>, reason: String| {
            let f = Arc::clone(&f);
            async move { f(&conn, &reason) }.boxed()
        }));
    }

    /// Register an already-boxed asynchronous disconnect callback
    pub fn set_disconnect_callback(&self, callback: DisconnectCallback) {
        *self.on_disconnect.write() = Some(callback);
    }

    /// Register `callback` only when no disconnect callback exists yet
    ///
    /// Returns whether it was stored.
    pub fn set_disconnect_callback_if_absent(&self, callback: DisconnectCallback) -> bool {
        let mut slot = self.on_disconnect.write();
        if slot.is_some() {
            return false;
        }
        *slot = Some(callback);
        true
    }

    pub fn has_disconnect_callback(&self) -> bool {
        self.on_disconnect.read().is_some()
    }

    pub fn on_error<F>(&self, f: F)
    where
        F: Fn(Option<&NamespaceConn>, &SocketIoError) + Send + Sync + 'static,
    {
        *self.on_error.write() = Some(Arc::new(f));
    }

    /// Register a closure for a named event
    pub fn on_event<F>(&self, event: impl Into<String>, f: F)
    where
        F: Fn(&NamespaceConn, Vec<Value>) -> Vec<Value> + Send + Sync + 'static,
    {
        self.on_event_handler(event, FnHandler(f));
    }

    /// Register a typed handler for a named event
    pub fn on_event_handler<H>(&self, event: impl Into<String>, handler: H)
    where
        H: EventHandler,
    {
        self.events.write().insert(event.into(), Arc::new(handler));
    }

    pub fn event_handler(&self, event: &str) -> Option<Arc<dyn EventHandler>> {
        self.events.read().get(event).cloned()
    }

    pub fn has_error_handler(&self) -> bool {
        self.on_error.read().is_some()
    }

    /// Run the connect callback, if any
    pub fn dispatch_connect(&self, conn: &NamespaceConn) -> Result<()> {
        let callback = self.on_connect.read().clone();
        match callback {
            Some(callback) => callback(conn),
            None => Ok(()),
        }
    }

    /// Run the disconnect callback, if any
    pub async fn dispatch_disconnect(&self, conn: Arc<NamespaceConn>, reason: String) {
        let callback = self.on_disconnect.read().clone();
        match callback {
            Some(callback) => callback(conn, reason).await,
            None => debug!("No disconnect handler for namespace '{}'", self.name),
        }
    }

    /// Run the error callback; returns whether one was registered
    pub fn dispatch_error(&self, conn: Option<&NamespaceConn>, error: &SocketIoError) -> bool {
        let callback = self.on_error.read().clone();
        match callback {
            Some(callback) => {
                callback(conn, error);
                true
            }
            None => false,
        }
    }
}

/// Thread-safe namespace name -> handler map
#[derive(Default)]
pub struct NamespaceHandlers {
    handlers: RwLock<HashMap<String, Arc<NamespaceHandler>>>,
}

impl NamespaceHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, namespace: &str) -> Option<Arc<NamespaceHandler>> {
        self.handlers.read().get(namespace).cloned()
    }

    /// Insert or replace the handler for a namespace
    pub fn set(&self, namespace: impl Into<String>, handler: Arc<NamespaceHandler>) {
        self.handlers.write().insert(namespace.into(), handler);
    }

    /// Return the handler for a namespace, creating it if absent
    ///
    /// Concurrent callers for the same name all observe the same instance.
    pub fn get_or_create(&self, namespace: &str) -> Arc<NamespaceHandler> {
        if let Some(handler) = self.get(namespace) {
            return handler;
        }

        let mut handlers = self.handlers.write();
        Arc::clone(
            handlers
                .entry(namespace.to_string())
                .or_insert_with(|| Arc::new(NamespaceHandler::new(namespace))),
        )
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.handlers.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_get_missing_returns_none() {
        let handlers = NamespaceHandlers::new();
        assert!(handlers.get("chat").is_none());
        assert!(handlers.is_empty());
    }

    #[test]
    fn test_set_replaces() {
        let handlers = NamespaceHandlers::new();
        let first = Arc::new(NamespaceHandler::new("chat"));
        let second = Arc::new(NamespaceHandler::new("chat"));

        handlers.set("chat", Arc::clone(&first));
        handlers.set("chat", Arc::clone(&second));

        let stored = handlers.get("chat").unwrap();
        assert!(Arc::ptr_eq(&stored, &second));
        assert_eq!(handlers.len(), 1);
    }

    #[test]
    fn test_concurrent_get_or_create_yields_one_instance() {
        let handlers = Arc::new(NamespaceHandlers::new());
        let mut threads = Vec::new();

        for _ in 0..16 {
            let handlers = Arc::clone(&handlers);
            threads.push(thread::spawn(move || handlers.get_or_create("chat")));
        }

        let results: Vec<Arc<NamespaceHandler>> =
            threads.into_iter().map(|t| t.join().unwrap()).collect();
        let stored = handlers.get("chat").unwrap();

        assert_eq!(handlers.len(), 1);
        assert!(results.iter().all(|h| Arc::ptr_eq(h, &stored)));
    }

    #[test]
    fn test_dispatch_error_reports_registration() {
        let handler = NamespaceHandler::new("");
        assert!(!handler.dispatch_error(None, &SocketIoError::NotConnected));

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        handler.on_error(move |conn, _err| {
            assert!(conn.is_none());
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(handler.has_error_handler());
        assert!(handler.dispatch_error(None, &SocketIoError::NotConnected));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_event_handlers_are_looked_up_by_name() {
        let handler = NamespaceHandler::new("");
        handler.on_event("echo", |_conn, args| args);

        assert!(handler.event_handler("echo").is_some());
        assert!(handler.event_handler("missing").is_none());
    }

    #[test]
    fn test_default_disconnect_callback_does_not_replace() {
        let handler = NamespaceHandler::new("chat");
        assert!(!handler.has_disconnect_callback());

        let noop = || -> DisconnectCallback {
            Arc::new(|_conn: Arc<NamespaceConn>, _reason: String| async {}.boxed())
        };
        assert!(handler.set_disconnect_callback_if_absent(noop()));
        assert!(!handler.set_disconnect_callback_if_absent(noop()));
        assert!(handler.has_disconnect_callback());
    }
}
