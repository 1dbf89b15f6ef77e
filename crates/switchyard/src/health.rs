//! Structured health reporting for service lifecycle events.

use std::sync::Arc;

use switchyard_config::Config;

use crate::bootstrap::BootstrapError;
use crate::manager::WorkerExit;

/// Tracing target for lifecycle events.
const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked when a worker begins consuming `queue`.
    fn consume_ready(&self, worker: usize, queue: &str);

    /// Invoked when a worker stops consuming `queue`.
    fn consume_ended(&self, worker: usize, queue: &str);

    /// Invoked after a worker thread is spawned.
    fn worker_started(&self, worker: usize);

    /// Invoked after a worker thread has been joined.
    fn worker_exited(&self, worker: usize, exit: &WorkerExit);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter + ?Sized,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn consume_ready(&self, worker: usize, queue: &str) {
        (**self).consume_ready(worker, queue);
    }

    fn consume_ended(&self, worker: usize, queue: &str) {
        (**self).consume_ended(worker, queue);
    }

    fn worker_started(&self, worker: usize) {
        (**self).worker_started(worker);
    }

    fn worker_exited(&self, worker: usize, exit: &WorkerExit) {
        (**self).worker_exited(worker, exit);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting service bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            bus_uri = %config.bus_uri(),
            exchange = config.bus_exchange(),
            queues = config.queues().len(),
            workers = config.workers(),
            log_filter = config.log_filter(),
            log_format = %config.log_format(),
            "service bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "service bootstrap failed"
        );
    }

    fn consume_ready(&self, worker: usize, queue: &str) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "consume_ready",
            worker,
            queue,
            "ready to consume"
        );
    }

    fn consume_ended(&self, worker: usize, queue: &str) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "consume_ended",
            worker,
            queue,
            "consuming has ended"
        );
    }

    fn worker_started(&self, worker: usize) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "worker_started",
            worker,
            "worker started"
        );
    }

    fn worker_exited(&self, worker: usize, exit: &WorkerExit) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "worker_exited",
            worker,
            exit = %exit,
            "worker exited"
        );
    }
}
