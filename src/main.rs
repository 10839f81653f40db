//! Socket Queue Bridge - main entry point

use clap::Parser;
use socket_queue_bridge::bridge::Bridge;
use socket_queue_bridge::cli::Cli;
use socket_queue_bridge::config::BridgeConfig;
use socket_queue_bridge::error::BridgeResult;
use socket_queue_bridge::observability::{init_logging, LogFormat};
use socket_queue_bridge::transport::mqtt::MqttBrokerConnector;
use socket_queue_bridge::transport::tcp::TcpSourceConnector;
use std::process;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            process::exit(1);
        }
    };

    if cli.pretend {
        match serde_json::to_string_pretty(&config) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Failed to serialize configuration: {e}");
                process::exit(1);
            }
        }
        return;
    }

    if let Err(e) = init_logging(&config.logging, LogFormat::from_env()) {
        eprintln!("{e}");
        process::exit(e.exit_code());
    }

    info!(
        "Starting socket-queue-bridge v{}",
        env!("CARGO_PKG_VERSION")
    );

    if let Err(e) = run_bridge(config).await {
        error!("Bridge failed: {}", e);
        process::exit(e.exit_code());
    }

    info!("Application shutdown complete");
}

async fn run_bridge(config: BridgeConfig) -> BridgeResult<()> {
    let source = TcpSourceConnector::new(&config.source);
    let broker = MqttBrokerConnector::new(&config.broker)?;
    let bridge = Bridge::new(config, source, broker)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => info!("Received SIGINT, shutting down gracefully..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully..."),
            _ = signal::ctrl_c() => info!("Received Ctrl-C, shutting down gracefully..."),
        }
        let _ = shutdown_tx.send(true);
    });

    let stats = bridge.run(shutdown_rx).await;
    match serde_json::to_string(&stats) {
        Ok(json) => info!(stats = %json, "Final bridge statistics"),
        Err(e) => error!("Failed to serialize final statistics: {}", e),
    }

    Ok(())
}
