//! A single worker consuming one queue subscription.
//!
//! Composition over inheritance: a [`Service`] owns a bus subscription and a
//! dispatcher over the shared registry, and knows nothing about the
//! handlers themselves.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use serde_json::Value;
use switchyard_config::DEFAULT_POLL_INTERVAL_MS;
use tracing::{debug, warn};

use crate::ack::{AckController, AckPolicy};
use crate::bus::{Bus, BusError};
use crate::dispatch::Dispatcher;
use crate::envelope::{RequestId, encode_response};
use crate::health::HealthReporter;
use crate::registry::HandlerRegistry;

/// Tracing target for worker loops.
pub(crate) const SERVICE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::service");

/// Pause after a bus failure before consuming again.
pub const ERROR_BACKOFF: Duration = Duration::from_millis(500);

/// Everything workers share, built once at startup.
#[derive(Clone)]
pub struct ServiceContext {
    registry: Arc<HandlerRegistry>,
    reporter: Arc<dyn HealthReporter>,
    policy: AckPolicy,
    poll_interval: Duration,
}

impl ServiceContext {
    /// Creates a context with the default acknowledgment policy and poll
    /// interval.
    #[must_use]
    pub fn new(registry: Arc<HandlerRegistry>, reporter: Arc<dyn HealthReporter>) -> Self {
        Self {
            registry,
            reporter,
            policy: AckPolicy::default(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }

    /// Replaces the acknowledgment policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: AckPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replaces how long a worker blocks waiting for a delivery.
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// The shared registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// The shared reporter.
    #[must_use]
    pub fn reporter(&self) -> &Arc<dyn HealthReporter> {
        &self.reporter
    }
}

impl fmt::Debug for ServiceContext {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ServiceContext")
            .field("registry", &self.registry)
            .field("policy", &self.policy)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

/// One worker: consumes its subscription sequentially, one delivery at a
/// time.
pub struct Service<B> {
    worker: usize,
    queue: String,
    bus: B,
    dispatcher: Dispatcher,
    ack: AckController,
    reporter: Arc<dyn HealthReporter>,
    poll_interval: Duration,
}

impl<B: Bus> Service<B> {
    /// Creates worker number `worker` consuming `queue` through `bus`.
    pub fn new(context: &ServiceContext, worker: usize, queue: impl Into<String>, bus: B) -> Self {
        Self {
            worker,
            queue: queue.into(),
            bus,
            dispatcher: Dispatcher::new(Arc::clone(&context.registry)),
            ack: AckController::new(context.policy),
            reporter: Arc::clone(&context.reporter),
            poll_interval: context.poll_interval,
        }
    }

    /// Index of this worker.
    #[must_use]
    pub const fn worker(&self) -> usize {
        self.worker
    }

    /// Name of the consumed queue.
    #[must_use]
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Waits up to `timeout` for one delivery, then dispatches and settles
    /// it. Returns whether a delivery was handled.
    ///
    /// # Errors
    ///
    /// Returns [`BusError`] when receiving or settling fails.
    pub fn consume_once(&self, timeout: Duration) -> Result<bool, BusError> {
        let Some(delivery) = self.bus.next_delivery(timeout)? else {
            return Ok(false);
        };
        let dispatched = self.dispatcher.dispatch(&delivery);
        let disposition = self.ack.settle(&self.bus, &delivery, &dispatched)?;
        debug!(
            target: SERVICE_TARGET,
            worker = self.worker,
            queue = %self.queue,
            tag = delivery.tag,
            outcome = dispatched.outcome.kind(),
            ?disposition,
            "delivery complete"
        );
        Ok(true)
    }

    /// Consumes until `shutdown` is set.
    ///
    /// Bus failures never end the loop: they are logged and followed by
    /// [`ERROR_BACKOFF`].
    pub fn run(&self, shutdown: &AtomicBool) {
        self.reporter.consume_ready(self.worker, &self.queue);
        while !shutdown.load(Ordering::Acquire) {
            if let Err(error) = self.consume_once(self.poll_interval) {
                warn!(
                    target: SERVICE_TARGET,
                    worker = self.worker,
                    queue = %self.queue,
                    %error,
                    "bus failure while consuming; backing off"
                );
                thread::sleep(ERROR_BACKOFF);
            }
        }
        self.reporter.consume_ended(self.worker, &self.queue);
    }

    /// Publishes a bare response for `id` directly onto `queue`.
    ///
    /// # Errors
    ///
    /// Returns [`BusError`] when the publish fails.
    pub fn respond(&self, queue: &str, id: &RequestId, result: &Value) -> Result<(), BusError> {
        debug!(target: SERVICE_TARGET, queue, %id, "sending response");
        self.bus.publish(queue, &encode_response(id, result))
    }
}

impl<B> fmt::Debug for Service<B> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Service")
            .field("worker", &self.worker)
            .field("queue", &self.queue)
            .field("dispatcher", &self.dispatcher)
            .field("ack", &self.ack)
            .finish_non_exhaustive()
    }
}
