//! TCP source connector against a real listener

use bytes::BytesMut;
use socket_queue_bridge::bridge::{event_channel, BridgeEvent, EventReceiver, SourceEvent};
use socket_queue_bridge::config::SourceSection;
use socket_queue_bridge::transport::tcp::TcpSourceConnector;
use socket_queue_bridge::transport::{SourceConnector, SourceHandle};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

async fn listener() -> (TcpListener, SourceSection) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = SourceSection {
        host: "127.0.0.1".to_string(),
        port: listener.local_addr().unwrap().port(),
        ..SourceSection::default()
    };
    (listener, config)
}

async fn next_event(rx: &mut EventReceiver) -> (u64, SourceEvent) {
    match timeout(WAIT, rx.recv()).await.unwrap().unwrap() {
        BridgeEvent::Source { epoch, event } => (epoch, event),
        other => panic!("unexpected event {other:?}"),
    }
}

/// Collect data events until `expected` bytes have arrived
async fn read_bytes(rx: &mut EventReceiver, expected: usize) -> Vec<u8> {
    let mut received = BytesMut::new();
    while received.len() < expected {
        match next_event(rx).await {
            (_, SourceEvent::Data(chunk)) => received.extend_from_slice(&chunk),
            (_, other) => panic!("unexpected event {other:?}"),
        }
    }
    received.to_vec()
}

#[tokio::test]
async fn test_connect_read_and_disconnect() {
    let (listener, config) = listener().await;
    let connector = TcpSourceConnector::new(&config);
    let (tx, mut rx) = event_channel();

    let _handle = connector.connect(7, tx);
    let (mut socket, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();

    let (epoch, event) = next_event(&mut rx).await;
    assert_eq!(epoch, 7);
    assert!(matches!(event, SourceEvent::Connected { .. }));

    socket.write_all(b"\x0241\x03").await.unwrap();
    assert_eq!(read_bytes(&mut rx, 4).await, b"\x0241\x03");

    drop(socket);
    assert_eq!(next_event(&mut rx).await, (7, SourceEvent::Disconnected));
}

#[tokio::test]
async fn test_refused_connection_reports_error() {
    let (listener, config) = listener().await;
    drop(listener);

    let connector = TcpSourceConnector::new(&config);
    let (tx, mut rx) = event_channel();
    let _handle = connector.connect(1, tx);

    let (epoch, event) = next_event(&mut rx).await;
    assert_eq!(epoch, 1);
    assert!(matches!(event, SourceEvent::Error(_)));
}

#[tokio::test]
async fn test_idle_timeout_keeps_reading() {
    let (listener, mut config) = listener().await;
    config.idle_timeout_ms = 50;
    let connector = TcpSourceConnector::new(&config);
    let (tx, mut rx) = event_channel();

    let _handle = connector.connect(2, tx);
    let (mut socket, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
    assert!(matches!(next_event(&mut rx).await.1, SourceEvent::Connected { .. }));

    assert_eq!(next_event(&mut rx).await, (2, SourceEvent::Timeout));

    socket.write_all(b"late\n").await.unwrap();
    loop {
        match next_event(&mut rx).await {
            (_, SourceEvent::Timeout) => continue,
            (_, SourceEvent::Data(chunk)) => {
                assert_eq!(&chunk[..], b"late\n");
                break;
            }
            (_, other) => panic!("unexpected event {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_close_drops_the_socket() {
    let (listener, config) = listener().await;
    let connector = TcpSourceConnector::new(&config);
    let (tx, mut rx) = event_channel();

    let mut handle = connector.connect(3, tx);
    let (mut socket, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
    assert!(matches!(next_event(&mut rx).await.1, SourceEvent::Connected { .. }));

    handle.close();

    let mut buf = [0u8; 16];
    let read = timeout(WAIT, socket.read(&mut buf)).await.unwrap();
    assert!(matches!(read, Ok(0) | Err(_)));
}
