//! # Ledger Telemetry
//!
//! Logging and metrics bootstrap for ledger nodes.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ledger_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(&TelemetryConfig::from_env())?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `LEDGER_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter |
//! | `LEDGER_JSON_LOGS` | `false` | JSON log lines |
//! | `LEDGER_SERVICE_NAME` | `ledger-node` | Service name |

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::{init_logging, LoggingGuard};
pub use metrics::{
    gather_metrics, record_command_applied, record_envelope_rejection, record_reconcile_retry,
    record_replication_timeout, register_metrics, set_reconcile_lag, RequestTimer,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Global subscriber already installed: {0}")]
    AlreadyInitialized(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and register metrics.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    register_metrics()?;
    let logging = init_logging(config)?;
    Ok(TelemetryGuard { _logging: logging })
}

/// Keeps telemetry active. Drop on shutdown.
pub struct TelemetryGuard {
    _logging: LoggingGuard,
}
