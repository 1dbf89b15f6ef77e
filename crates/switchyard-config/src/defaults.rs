//! Default values shared by the configuration loader and its callers.

use crate::bus::BusUri;
use crate::logging::LogFormat;

/// Bus URI used when none is configured: the in-process topic exchange.
pub const DEFAULT_BUS_URI: &str = "memory://localhost/";

/// Name of the topic exchange services bind their queues to.
pub const DEFAULT_BUS_EXCHANGE: &str = "switchyard";

/// Number of worker threads a service manager keeps alive.
pub const DEFAULT_WORKERS: usize = 1;

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// How long a worker waits for a delivery before re-checking for shutdown.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

/// Default bus URI.
#[must_use]
pub fn default_bus_uri() -> BusUri {
    DEFAULT_BUS_URI
        .parse()
        .unwrap_or_else(|_| BusUri::memory("localhost"))
}

/// Owned exchange name for serde defaults.
#[must_use]
pub fn default_bus_exchange() -> String {
    DEFAULT_BUS_EXCHANGE.to_owned()
}

/// Worker count for serde defaults.
#[must_use]
pub const fn default_workers() -> usize {
    DEFAULT_WORKERS
}

/// Default log filter expression.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Poll interval for serde defaults.
#[must_use]
pub const fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}
