//! Observability: structured logging setup and bridge metrics

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat};
pub use metrics::{MetricsCollector, MetricsSnapshot};
