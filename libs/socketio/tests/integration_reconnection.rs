//! Integration tests for reconnection behavior

mod common;

use common::{wait_until, MockDialer};
use parking_lot::Mutex;
use serde_json::json;
use socketio::{BackOff, Client, ClientEvent, ClientOptions, SocketIoError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(3);

fn fast_options(attempts: u32) -> ClientOptions {
    ClientOptions::default()
        .with_reconnection_attempts(attempts)
        .with_reconnection_delay(Duration::from_millis(10))
        .with_reconnection_delay_max(Duration::from_millis(20))
}

fn drain_events(client: &Client) -> Vec<ClientEvent> {
    std::iter::from_fn(|| client.try_recv_event()).collect()
}

#[test]
fn test_backoff_stays_within_bounds() {
    verbose_println!("Testing backoff bounds...");

    let base = Duration::from_millis(100);
    let max = Duration::from_secs(2);
    let mut backoff = BackOff::new(base, max, 2.0, 0.5);

    for attempt in 0..20 {
        let delay = backoff.duration();
        verbose_println!("  attempt {} -> {:?}", attempt, delay);
        assert!(delay >= base, "attempt {} below base: {:?}", attempt, delay);
        assert!(delay <= max, "attempt {} above max: {:?}", attempt, delay);
    }
    assert_eq!(backoff.attempts(), 20);
}

#[test]
fn test_backoff_raw_delays_never_decrease() {
    let backoff = BackOff::new(Duration::from_millis(50), Duration::from_secs(1), 2.0, 0.5);

    let delays: Vec<Duration> = (0..12).map(|n| backoff.raw_delay(n)).collect();
    assert!(delays.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(delays[0], Duration::from_millis(50));
    assert_eq!(delays[11], Duration::from_secs(1));
}

#[tokio::test]
async fn test_exhausted_after_max_attempts() {
    verbose_println!("Testing reconnect exhaustion...");

    let dialer = MockDialer::scripted(vec![true], false);
    let client = Client::with_dialer("http://localhost:3000/ns", fast_options(2), dialer.clone()).unwrap();
    client.on_connect(|_| Ok(()));

    let disconnects = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&disconnects);
    client.on_disconnect(move |_, reason| sink.lock().push(reason.to_string()));

    let errors = Arc::new(Mutex::new(Vec::new()));
    let error_sink = Arc::clone(&errors);
    client.on_error(move |conn, err| error_sink.lock().push((conn.is_none(), err.clone())));

    client.connect().await.unwrap();
    let server = dialer.server(0).unwrap();
    server.send_text("0/ns,");
    assert!(wait_until(WAIT, || client.is_connected()).await);

    server.send_text("1/ns,");
    assert!(wait_until(WAIT, || !disconnects.lock().is_empty()).await);

    assert_eq!(dialer.attempts(), 3, "initial dial plus two reconnect attempts");
    assert_eq!(*disconnects.lock(), vec!["io server disconnect".to_string()]);
    assert!(!client.is_reconnecting());
    assert_eq!(client.backoff_attempts(), 2);

    let events = drain_events(&client);
    verbose_println!("  events: {:?}", events);
    assert!(events.contains(&ClientEvent::Reconnecting(1)));
    assert!(events.contains(&ClientEvent::Reconnecting(2)));
    assert!(!events.contains(&ClientEvent::Reconnecting(3)));
    assert_eq!(events.last(), Some(&ClientEvent::ReconnectExhausted(2)));

    let errors = errors.lock();
    assert!(errors.contains(&(true, SocketIoError::ReconnectExhausted { attempts: 2 })));
}

#[tokio::test]
async fn test_direct_reconnect_reports_exhaustion() {
    let dialer = MockDialer::refusing();
    let client = Client::with_dialer("http://localhost:3000/", fast_options(3), dialer.clone()).unwrap();
    client.on_connect(|_| Ok(()));

    let err = client.reconnect().await.unwrap_err();
    assert_eq!(err, SocketIoError::ReconnectExhausted { attempts: 3 });
    assert_eq!(dialer.attempts(), 3);

    let events = drain_events(&client);
    let attempts: Vec<u32> = events
        .iter()
        .filter_map(|event| match event {
            ClientEvent::Reconnecting(n) => Some(*n),
            _ => None,
        })
        .collect();
    assert_eq!(attempts, vec![1, 2, 3]);
    assert!(events.contains(&ClientEvent::ReconnectExhausted(3)));
}

#[tokio::test]
async fn test_concurrent_reconnect_returns_immediately() {
    let dialer = MockDialer::refusing();
    let client = Client::with_dialer(
        "http://localhost:3000/",
        ClientOptions::default()
            .with_reconnection_attempts(2)
            .with_reconnection_delay(Duration::from_millis(200))
            .with_reconnection_delay_max(Duration::from_millis(200)),
        dialer.clone(),
    )
    .unwrap();
    client.on_connect(|_| Ok(()));

    let first = tokio::spawn({
        let client = client.clone();
        async move { client.reconnect().await }
    });
    assert!(wait_until(WAIT, || client.is_reconnecting()).await);

    let started = std::time::Instant::now();
    client.reconnect().await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(100));

    let result = first.await.unwrap();
    assert!(matches!(result, Err(SocketIoError::ReconnectExhausted { attempts: 2 })));
    assert_eq!(dialer.attempts(), 2);
    assert!(!client.is_reconnecting());
}

#[tokio::test]
async fn test_successful_reconnect_keeps_handlers() {
    verbose_println!("Testing handler reuse across reconnects...");

    let dialer = MockDialer::scripted(vec![true, false, true], false);
    let client = Client::with_dialer("http://localhost:3000/ns", fast_options(5), dialer.clone()).unwrap();

    let connects = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&connects);
    client.on_connect(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let pings = Arc::new(AtomicUsize::new(0));
    let ping_counter = Arc::clone(&pings);
    client.on_event("ping", move |_, _| {
        ping_counter.fetch_add(1, Ordering::SeqCst);
        vec![json!("pong")]
    });

    let disconnects = Arc::new(AtomicUsize::new(0));
    let disconnect_counter = Arc::clone(&disconnects);
    client.on_disconnect(move |_, _| {
        disconnect_counter.fetch_add(1, Ordering::SeqCst);
    });

    client.connect().await.unwrap();
    let first = dialer.server(0).unwrap();
    first.send_text("0/ns,");
    assert!(wait_until(WAIT, || client.is_connected()).await);
    let first_conn = client.connection().unwrap();

    first.send_text("1/ns,");
    assert!(wait_until(WAIT, || disconnects.load(Ordering::SeqCst) == 1).await);
    assert_eq!(dialer.attempts(), 3);

    let second = dialer.server(1).unwrap();
    assert_ne!(second.id(), first.id());
    assert_eq!(second.written_texts().first().map(String::as_str), Some("0/ns,"));

    let second_conn = client.connection().unwrap();
    assert!(!Arc::ptr_eq(&first_conn, &second_conn));
    assert!(first_conn.is_terminated());

    second.send_text("0/ns,");
    second.send_text(r#"2/ns,1["ping"]"#);
    assert!(wait_until(WAIT, || second.has_written(r#"3/ns,1["pong"]"#)).await);
    assert_eq!(connects.load(Ordering::SeqCst), 2);
    assert_eq!(pings.load(Ordering::SeqCst), 1);
    assert_eq!(client.backoff_attempts(), 2);
}

#[tokio::test]
async fn test_close_resets_backoff() {
    let dialer = MockDialer::scripted(vec![false, true], true);
    let client = Client::with_dialer("http://localhost:3000/", fast_options(5), dialer.clone()).unwrap();
    client.on_connect(|_| Ok(()));

    client.reconnect().await.unwrap();
    assert_eq!(client.backoff_attempts(), 2);

    client.close().await.unwrap();
    assert_eq!(client.backoff_attempts(), 0);
}

#[tokio::test]
async fn test_reconnects_without_disconnect_callback() {
    verbose_println!("Testing reconnect with only a connect handler...");

    let dialer = MockDialer::accepting();
    let client = Client::with_dialer("http://localhost:3000/ns", fast_options(3), dialer.clone()).unwrap();

    let connects = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&connects);
    client.on_connect(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    client.connect().await.unwrap();
    let first = dialer.server(0).unwrap();
    first.send_text("0/ns,");
    assert!(wait_until(WAIT, || client.is_connected()).await);

    // A broken stream must still lead to a new connection
    first.send_text("x garbage");
    assert!(wait_until(WAIT, || dialer.attempts() == 2).await);
    assert!(first.is_closed());

    let second = dialer.server(1).unwrap();
    assert!(wait_until(WAIT, || second.has_written("0/ns,")).await);
    second.send_text("0/ns,");
    assert!(wait_until(WAIT, || connects.load(Ordering::SeqCst) == 2).await);
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_no_reconnect_when_disabled() {
    let dialer = MockDialer::accepting();
    let client = Client::with_dialer(
        "http://localhost:3000/",
        fast_options(3).with_reconnection(false),
        dialer.clone(),
    )
    .unwrap();
    client.on_connect(|_| Ok(()));

    let disconnected = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&disconnected);
    client.on_disconnect(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    client.connect().await.unwrap();
    dialer.server(0).unwrap().send_text("1");

    assert!(wait_until(WAIT, || disconnected.load(Ordering::SeqCst) == 1).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(dialer.attempts(), 1);
    assert!(drain_events(&client)
        .iter()
        .all(|event| !matches!(event, ClientEvent::Reconnecting(_))));
}
