//! Command line interface
//!
//! `-h` selects the source host, so clap's generated help flag is replaced by
//! `-?`/`--help`. Flags override the TOML file (when given) and the built-in
//! defaults; they are applied once, before validation.

use crate::config::{BridgeConfig, ConfigError};
use crate::framing::FramingMode;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(name = "socket-queue-bridge")]
#[command(about = "Forward framed messages from a TCP data source to an MQTT topic")]
#[command(version, disable_help_flag = true)]
pub struct Cli {
    /// Source hostname or address
    #[arg(short = 'h', long)]
    pub host: Option<String>,

    /// Source port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// MQTT broker (host, host:port or mqtt://host:port)
    #[arg(short, long)]
    pub broker: Option<String>,

    /// Topic to publish to
    #[arg(short, long)]
    pub topic: Option<String>,

    /// Publish quality of service
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=2))]
    pub qos: Option<u8>,

    /// Newline-delimited text frames instead of STX/ETX
    #[arg(short = 'T', long)]
    pub text: bool,

    /// Only log warnings and errors
    #[arg(short = 'Q', long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Also append log output to this file
    #[arg(short = 'L', long = "log", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Print the effective configuration as JSON and exit
    #[arg(short = '!', long)]
    pub pretend: bool,

    /// TOML configuration file loaded before the flags are applied
    #[arg(short, long, value_name = "FILE", env = "SOCKET_QUEUE_BRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print help
    #[arg(short = '?', long, action = ArgAction::Help)]
    pub help: Option<bool>,
}

impl Cli {
    /// Build the effective configuration: file (or defaults), then flags,
    /// then validation
    pub fn load_config(&self) -> Result<BridgeConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => BridgeConfig::load_from_file(path)?,
            None => BridgeConfig::default(),
        };

        self.apply_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Copy every flag that was given onto `config`
    pub fn apply_overrides(&self, config: &mut BridgeConfig) {
        if let Some(host) = &self.host {
            config.source.host = host.clone();
        }
        if let Some(port) = self.port {
            config.source.port = port;
        }
        if self.text {
            config.source.framing = FramingMode::Text;
        }

        if let Some(broker) = &self.broker {
            config.broker.address = broker.clone();
        }
        if let Some(topic) = &self.topic {
            config.broker.topic = topic.clone();
        }
        if let Some(qos) = self.qos {
            config.broker.qos = qos;
        }

        if self.quiet {
            config.logging.quiet = true;
            config.logging.verbose = 0;
        }
        if self.verbose > 0 {
            config.logging.verbose = self.verbose;
            config.logging.quiet = false;
        }
        if let Some(path) = &self.log_file {
            config.logging.file = Some(path.clone());
        }
    }
}
