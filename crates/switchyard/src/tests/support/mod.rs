//! Test harness utilities shared by the behavioural and runtime suites.

mod config_loader;
mod reporter;
mod services;
mod shutdown;

pub use config_loader::{FailingConfigLoader, QueuelessConfigLoader, TestConfigLoader};
pub use reporter::{HealthEvent, RecordingHealthReporter};
pub use services::{CALC_QUEUE, REPLY_QUEUE, calculator_registry, wait_for};
pub use shutdown::TestShutdownSignal;
