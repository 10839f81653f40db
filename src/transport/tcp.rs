//! TCP source connector
//!
//! One task per source epoch: connect with a timeout, then forward every
//! chunk read from the socket as [`SourceEvent::Data`]. The task ends after
//! reporting `Disconnected` or `Error`, or when its handle is closed.

use crate::bridge::{BridgeEvent, Epoch, EventSender, SourceEvent};
use crate::config::SourceSection;
use crate::transport::{SourceConnector, SourceHandle};
use bytes::BytesMut;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Read buffer reserved before every read
const READ_CHUNK_SIZE: usize = 8192;

/// Opens TCP connections to the configured data source
#[derive(Debug, Clone)]
pub struct TcpSourceConnector {
    host: String,
    port: u16,
    connect_timeout: Duration,
    idle_timeout: Duration,
}

impl TcpSourceConnector {
    pub fn new(config: &SourceSection) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            connect_timeout: config.connect_timeout(),
            idle_timeout: config.idle_timeout(),
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl SourceConnector for TcpSourceConnector {
    type Handle = TcpSourceHandle;

    fn connect(&self, epoch: Epoch, events: EventSender) -> TcpSourceHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let reader = SourceReader {
            epoch,
            events,
            shutdown_rx,
            idle_timeout: self.idle_timeout,
        };
        let task_handle = tokio::spawn(reader.run(self.host.clone(), self.port, self.connect_timeout));

        TcpSourceHandle {
            shutdown_tx,
            task_handle: Some(task_handle),
        }
    }
}

/// Live source connection task
#[derive(Debug)]
pub struct TcpSourceHandle {
    shutdown_tx: watch::Sender<bool>,
    task_handle: Option<JoinHandle<()>>,
}

impl SourceHandle for TcpSourceHandle {
    fn close(&mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

impl Drop for TcpSourceHandle {
    fn drop(&mut self) {
        self.close();
    }
}

struct SourceReader {
    epoch: Epoch,
    events: EventSender,
    shutdown_rx: watch::Receiver<bool>,
    idle_timeout: Duration,
}

impl SourceReader {
    async fn report(&self, event: SourceEvent) -> bool {
        self.events
            .send(BridgeEvent::source(self.epoch, event))
            .await
            .is_ok()
    }

    async fn run(mut self, host: String, port: u16, connect_timeout: Duration) {
        let connected =
            tokio::time::timeout(connect_timeout, TcpStream::connect((host.as_str(), port))).await;

        let stream = match connected {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                self.report(SourceEvent::Error(format!("connect to {host}:{port} failed: {e}")))
                    .await;
                return;
            }
            Err(_) => {
                self.report(SourceEvent::Error(format!(
                    "connect to {host}:{port} timed out after {}ms",
                    connect_timeout.as_millis()
                )))
                .await;
                return;
            }
        };

        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| format!("{host}:{port}"));
        let local = stream
            .local_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_default();

        if !self.report(SourceEvent::Connected { peer, local }).await {
            return;
        }

        self.read_loop(stream).await;
        debug!(epoch = self.epoch, "Source reader stopped");
    }

    async fn read_loop(&mut self, mut stream: TcpStream) {
        let mut buffer = BytesMut::with_capacity(READ_CHUNK_SIZE);

        loop {
            buffer.reserve(READ_CHUNK_SIZE);

            let read_result = tokio::select! {
                biased;

                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        return;
                    }
                    continue;
                }
                read = tokio::time::timeout(self.idle_timeout, stream.read_buf(&mut buffer)) => read,
            };

            let event = match read_result {
                Ok(Ok(0)) => SourceEvent::Disconnected,
                Ok(Ok(n)) => {
                    trace!(epoch = self.epoch, bytes = n, "Read chunk from source");
                    SourceEvent::Data(buffer.split().freeze())
                }
                Ok(Err(e)) => SourceEvent::Error(e.to_string()),
                Err(_) => SourceEvent::Timeout,
            };

            let terminal = matches!(event, SourceEvent::Disconnected | SourceEvent::Error(_));
            if !self.report(event).await || terminal {
                return;
            }
        }
    }
}
