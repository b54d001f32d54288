//! Logging setup for SchemaKit binaries.
//!
//! The library only emits `tracing` events under the `schemakit_core`
//! target. Binaries call [`init_logging`] once; the filter keeps sqlx quiet
//! unless tracing is requested, because sqlx logs every executed statement
//! and statements carry quoted values.

use crate::Result;
use crate::error::SchemaKitError;
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a full filter that replaces the
/// verbosity-derived one, e.g. `schemakit_core=trace,sqlx=debug`.
pub const LOG_ENV: &str = "SCHEMAKIT_LOG";

/// Output format of log lines on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat {
    type Err = SchemaKitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(SchemaKitError::configuration(format!(
                "unknown log format '{}': expected text or json",
                other
            ))),
        }
    }
}

/// Filter directives for a verbosity level.
///
/// SchemaKit crates follow `-v`; sqlx stays at `warn` until `-vvv`.
fn filter_directives(verbose: u8, quiet: bool) -> String {
    let (own, sqlx) = match (quiet, verbose) {
        (true, _) => ("error", "error"),
        (false, 0) => ("info", "warn"),
        (false, 1) => ("debug", "warn"),
        (false, 2) => ("trace", "warn"),
        (false, _) => ("trace", "debug"),
    };
    format!("warn,schemakit={own},schemakit_core={own},sqlx={sqlx}")
}

/// Initializes logging on stderr.
///
/// # Arguments
/// * `verbose` - 0 logs SchemaKit at INFO, 1 at DEBUG, 2 at TRACE; 3+ also
///   shows sqlx statement logs
/// * `quiet` - If true, only show errors
/// * `format` - Text or JSON lines
///
/// A non-empty [`LOG_ENV`] overrides `verbose` and `quiet`.
///
/// # Errors
/// Returns a configuration error when the filter does not parse or a global
/// subscriber is already installed.
///
/// # Example
/// ```rust,no_run
/// use schemakit_core::logging::{LogFormat, init_logging};
///
/// init_logging(1, false, LogFormat::Text).expect("Failed to initialize logging");
/// ```
pub fn init_logging(verbose: u8, quiet: bool, format: LogFormat) -> Result<()> {
    let directives = std::env::var(LOG_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| filter_directives(verbose, quiet));
    let filter = EnvFilter::try_new(&directives).map_err(|e| {
        SchemaKitError::configuration(format!("Invalid log filter '{}': {}", directives, e))
    })?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose >= 2)
        .with_writer(std::io::stderr);
    let installed = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| {
        SchemaKitError::configuration(format!("Failed to initialize logging: {}", e))
    })
}
