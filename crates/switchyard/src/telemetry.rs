//! Process-wide structured logging for services.
//!
//! One subscriber serves every worker in the process, so each event carries
//! the name of the thread that emitted it (`switchyard-worker-<n>`,
//! `switchyard-shutdown`) alongside its target. That name, together with the
//! delivery tag most events record, is what ties a log line to the worker and
//! message it belongs to. Output goes to stderr as flattened JSON objects or
//! compact lines, stamped with RFC 3339 UTC times; colour is only used when
//! stderr is a terminal.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use switchyard_config::{Config, LogFormat};
use tracing::Subscriber;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::fmt::{self, time::UtcTime};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer};

/// Format of the subscriber installed by the first successful call.
static INSTALLED: OnceCell<LogFormat> = OnceCell::new();

/// Proof that telemetry is installed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryHandle {
    format: LogFormat,
}

impl TelemetryHandle {
    /// The output format in force. A later call asking for a different format
    /// still reports the one installed first.
    #[must_use]
    pub const fn format(self) -> LogFormat {
        self.format
    }
}

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Failed to parse the configured log filter expression.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Another global subscriber was already installed.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Installs the global subscriber described by `config`, once per process.
///
/// Workers and the bootstrap may all call this; only the first call that
/// succeeds installs anything.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] for an unparsable `log_filter` and
/// [`TelemetryError::Subscriber`] when a subscriber was installed by other
/// means.
///
/// # Examples
///
/// ```rust
/// use switchyard::telemetry;
/// use switchyard_config::Config;
///
/// # fn main() -> Result<(), switchyard::telemetry::TelemetryError> {
/// let config = Config::default();
/// let first = telemetry::initialise(&config)?;
/// let second = telemetry::initialise(&config)?;
/// assert_eq!(first.format(), second.format());
/// # Ok(())
/// # }
/// ```
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    INSTALLED
        .get_or_try_init(|| install_subscriber(config).map(|()| config.log_format()))
        .map(|format| TelemetryHandle { format: *format })
}

fn install_subscriber(config: &Config) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(config.log_filter())
        .map_err(|error| TelemetryError::Filter(error.to_string()))?;
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(output_layer(config.log_format()));
    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}

fn output_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    let base = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_timer(UtcTime::rfc_3339())
        .with_target(true)
        .with_thread_names(true);
    match format {
        LogFormat::Json => base.json().flatten_event(true).boxed(),
        LogFormat::Compact => base.compact().boxed(),
    }
}
