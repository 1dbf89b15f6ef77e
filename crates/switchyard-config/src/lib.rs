//! Shared configuration for Switchyard worker services.
//!
//! [`Config`] is layered by `ortho_config`: built-in defaults, then a TOML
//! configuration file, then `SWITCHYARD_*` environment variables, then
//! command-line flags. Every field has a default, so a service started with no
//! configuration at all consumes nothing until queues are declared.

mod bus;
mod defaults;
mod logging;
mod queue;

use std::sync::Arc;
use std::time::Duration;

use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use bus::{BusTransport, BusUri, BusUriParseError};
pub use defaults::{
    DEFAULT_BUS_EXCHANGE, DEFAULT_BUS_URI, DEFAULT_LOG_FILTER, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_WORKERS, default_bus_exchange, default_bus_uri, default_log_filter,
    default_log_filter_string, default_log_format, default_poll_interval_ms, default_workers,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use queue::{QueueBinding, QueueBindingParseError};

/// Runtime configuration for a Switchyard service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "SWITCHYARD")]
pub struct Config {
    /// Connection URI of the message bus.
    #[serde(default = "default_bus_uri")]
    pub bus_uri: BusUri,
    /// Name of the topic exchange queues are bound to.
    #[serde(default = "default_bus_exchange")]
    pub bus_exchange: String,
    /// Queues the service consumes, each written `name=pattern`.
    #[serde(default)]
    pub queues: Vec<QueueBinding>,
    /// Number of workers a service manager keeps alive.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// `tracing` filter expression.
    #[serde(default = "default_log_filter_string")]
    pub log_filter: String,
    /// Log output format.
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
    /// Milliseconds a worker blocks waiting for a delivery before it
    /// re-checks its shutdown flag.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bus_uri: default_bus_uri(),
            bus_exchange: default_bus_exchange(),
            queues: Vec::new(),
            workers: default_workers(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Config {
    /// Bus connection URI.
    #[must_use]
    pub const fn bus_uri(&self) -> &BusUri {
        &self.bus_uri
    }

    /// Topic exchange name.
    #[must_use]
    pub fn bus_exchange(&self) -> &str {
        &self.bus_exchange
    }

    /// Declared queue bindings.
    #[must_use]
    pub fn queues(&self) -> &[QueueBinding] {
        &self.queues
    }

    /// Worker count.
    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Delivery poll interval.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Checks invariants the loader cannot express through types alone.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigValidationError`] when the exchange name is blank, the
    /// worker count or poll interval is zero, or no queue is declared.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.bus_exchange.trim().is_empty() {
            return Err(ConfigValidationError::EmptyExchange);
        }
        if self.workers == 0 {
            return Err(ConfigValidationError::NoWorkers);
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigValidationError::ZeroPollInterval);
        }
        if self.queues.is_empty() {
            return Err(ConfigValidationError::NoQueues);
        }
        Ok(())
    }
}

/// Result alias matching the loader's error representation.
pub type LoadResult = Result<Config, Arc<OrthoError>>;

/// Invariant violations detected by [`Config::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigValidationError {
    /// The exchange name was blank.
    #[error("bus exchange name must not be empty")]
    EmptyExchange,
    /// The worker count was zero.
    #[error("at least one worker is required")]
    NoWorkers,
    /// The poll interval was zero.
    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,
    /// No queues were declared.
    #[error("no queues declared; add at least one `name=pattern` binding")]
    NoQueues,
}

#[cfg(test)]
mod tests;
