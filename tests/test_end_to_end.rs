//! Socket to broker forwarding through the running bridge
//!
//! A real TCP listener plays the data source; the broker is the auto-acking
//! mock so the published sequence can be inspected.

use socket_queue_bridge::bridge::Bridge;
use socket_queue_bridge::config::BridgeConfig;
use socket_queue_bridge::framing::FramingMode;
use socket_queue_bridge::observability::MetricsSnapshot;
use socket_queue_bridge::testing::MockBrokerConnector;
use socket_queue_bridge::transport::tcp::TcpSourceConnector;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

const WAIT: Duration = Duration::from_secs(5);

struct Harness {
    listener: TcpListener,
    broker: MockBrokerConnector,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<MetricsSnapshot>,
}

impl Harness {
    async fn start(framing: FramingMode) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let mut config = BridgeConfig::default();
        config.source.host = "127.0.0.1".to_string();
        config.source.port = listener.local_addr().unwrap().port();
        config.source.framing = framing;
        config.supervisor.heartbeat_interval_ms = 50;
        config.supervisor.stats_interval_secs = 0;

        let broker = MockBrokerConnector::auto();
        let source = TcpSourceConnector::new(&config.source);
        let bridge = Bridge::new(config, source, broker.clone()).unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(bridge.run(shutdown_rx));

        Self {
            listener,
            broker,
            shutdown_tx,
            task,
        }
    }

    async fn accept(&self) -> TcpStream {
        let (socket, _) = timeout(WAIT, self.listener.accept()).await.unwrap().unwrap();
        socket
    }

    async fn wait_for_published(&self, count: usize) -> Vec<String> {
        timeout(WAIT, async {
            while self.broker.published().len() < count {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        self.broker.published_payloads()
    }

    async fn stop(self) -> MetricsSnapshot {
        self.shutdown_tx.send(true).unwrap();
        timeout(WAIT, self.task).await.unwrap().unwrap()
    }
}

#[tokio::test]
async fn test_binary_frames_split_across_writes() {
    let harness = Harness::start(FramingMode::Binary).await;
    let mut socket = harness.accept().await;

    socket.write_all(b"\x0241\x03\x024").await.unwrap();
    socket.flush().await.unwrap();
    sleep(Duration::from_millis(20)).await;
    socket.write_all(b"2\x03").await.unwrap();

    assert_eq!(harness.wait_for_published(2).await, vec!["41", "42"]);

    let stats = harness.stop().await;
    assert_eq!(stats.frames_decoded, 2);
    assert_eq!(stats.messages_published, 2);
    assert!(stats.last_published_at.is_some());
}

#[tokio::test]
async fn test_text_lines_with_crlf_and_blank_line() {
    let harness = Harness::start(FramingMode::Text).await;
    let mut socket = harness.accept().await;

    socket.write_all(b"A\r\nB\n\n").await.unwrap();

    assert_eq!(harness.wait_for_published(2).await, vec!["A", "B"]);

    let stats = harness.stop().await;
    assert_eq!(stats.frames_discarded, 1);
}

#[tokio::test]
async fn test_source_reconnects_after_peer_closes() {
    let harness = Harness::start(FramingMode::Binary).await;

    let mut first = harness.accept().await;
    first.write_all(b"\x02one\x03\x02par").await.unwrap();
    assert_eq!(harness.wait_for_published(1).await, vec!["one"]);
    drop(first);

    let mut second = harness.accept().await;
    second.write_all(b"tial\x03\x02two\x03").await.unwrap();
    assert_eq!(harness.wait_for_published(2).await, vec!["one", "two"]);

    let stats = harness.stop().await;
    assert_eq!(stats.source_connections_lost, 1);
    assert_eq!(stats.frames_discarded, 1);
}
