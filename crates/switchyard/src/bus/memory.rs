//! In-process topic exchange.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use switchyard_config::{BusTransport, Config};
use tracing::{debug, trace};

use super::{BUS_TARGET, Bus, BusError, Delivery, DeliveryTag, Headers, PublishProperties};
use super::topic::topic_matches;

#[derive(Debug, Clone)]
struct Message {
    routing_key: String,
    payload: Vec<u8>,
    reply_to: Option<String>,
    headers: Headers,
    redelivered: bool,
}

#[derive(Debug, Default)]
struct Queue {
    bindings: Vec<String>,
    ready: VecDeque<Message>,
}

#[derive(Debug)]
struct Unsettled {
    queue: String,
    message: Message,
}

#[derive(Debug, Default)]
struct State {
    queues: HashMap<String, Queue>,
    unsettled: HashMap<DeliveryTag, Unsettled>,
    next_tag: DeliveryTag,
    fail_publishes: bool,
}

#[derive(Debug)]
struct Shared {
    exchange: String,
    state: Mutex<State>,
    arrivals: Condvar,
}

/// A topic exchange and its queues, held in process memory.
///
/// Clones share the same exchange. Queues are bound with topic patterns via
/// [`MemoryBus::declare_queue`] or declared unbound by
/// [`MemoryBus::consumer`], and live until [`MemoryBus::delete_queue`].
/// Direct publishes to a queue that does not exist are discarded, as a
/// broker's default exchange does.
#[derive(Debug, Clone)]
pub struct MemoryBus {
    shared: Arc<Shared>,
}

impl MemoryBus {
    /// Creates an empty exchange.
    #[must_use]
    pub fn new(exchange: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(Shared {
                exchange: exchange.into(),
                state: Mutex::new(State {
                    next_tag: 1,
                    ..State::default()
                }),
                arrivals: Condvar::new(),
            }),
        }
    }

    /// Creates the exchange named in `config` and declares its queues.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::UnsupportedTransport`] when the configured bus URI
    /// does not select the in-process transport.
    pub fn from_config(config: &Config) -> Result<Self, BusError> {
        let transport = config.bus_uri().transport();
        if transport != BusTransport::Memory {
            return Err(BusError::UnsupportedTransport {
                transport: transport.to_string(),
            });
        }
        let bus = Self::new(config.bus_exchange());
        for binding in config.queues() {
            bus.declare_queue(binding.name(), binding.pattern())?;
        }
        Ok(bus)
    }

    /// Name of the exchange.
    #[must_use]
    pub fn exchange(&self) -> &str {
        &self.shared.exchange
    }

    /// Declares `queue` if needed and binds it to `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Poisoned`] if the exchange state is poisoned.
    pub fn declare_queue(&self, queue: &str, pattern: &str) -> Result<(), BusError> {
        let mut state = self.lock()?;
        let entry = state.queues.entry(queue.to_owned()).or_default();
        if !entry.bindings.iter().any(|existing| existing == pattern) {
            entry.bindings.push(pattern.to_owned());
        }
        debug!(
            target: BUS_TARGET,
            exchange = %self.shared.exchange,
            queue,
            pattern,
            "queue bound"
        );
        Ok(())
    }

    /// Returns a subscription to `queue`, declaring it unbound if needed.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Poisoned`] if the exchange state is poisoned.
    pub fn consumer(&self, queue: &str) -> Result<QueueConsumer, BusError> {
        self.lock()?.queues.entry(queue.to_owned()).or_default();
        Ok(QueueConsumer {
            bus: self.clone(),
            queue: queue.to_owned(),
        })
    }

    /// Deletes `queue` with any messages still waiting on it, returning how
    /// many were discarded.
    ///
    /// Deliveries already handed out may still be acknowledged; rejecting
    /// them with requeue discards them instead.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Poisoned`] if the exchange state is poisoned.
    pub fn delete_queue(&self, queue: &str) -> Result<usize, BusError> {
        let removed = self.lock()?.queues.remove(queue);
        let discarded = removed.map_or(0, |entry| entry.ready.len());
        debug!(
            target: BUS_TARGET,
            exchange = %self.shared.exchange,
            queue,
            discarded,
            "queue deleted"
        );
        Ok(discarded)
    }

    /// Number of declared queues.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Poisoned`] if the exchange state is poisoned.
    pub fn queue_count(&self) -> Result<usize, BusError> {
        Ok(self.lock()?.queues.len())
    }

    /// Makes every subsequent publish fail until switched off again.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Poisoned`] if the exchange state is poisoned.
    pub fn fail_publishes(&self, enabled: bool) -> Result<(), BusError> {
        self.lock()?.fail_publishes = enabled;
        Ok(())
    }

    /// Number of messages waiting on `queue`.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Poisoned`] if the exchange state is poisoned.
    pub fn queue_depth(&self, queue: &str) -> Result<usize, BusError> {
        Ok(self
            .lock()?
            .queues
            .get(queue)
            .map_or(0, |entry| entry.ready.len()))
    }

    /// Number of deliveries handed out but not yet settled.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Poisoned`] if the exchange state is poisoned.
    pub fn unsettled(&self) -> Result<usize, BusError> {
        Ok(self.lock()?.unsettled.len())
    }

    /// Puts `payload` directly onto the queue named `destination`.
    ///
    /// The message is discarded when no such queue exists.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::PublishFailed`] while publish failures are being
    /// injected.
    pub fn publish(&self, destination: &str, payload: &[u8]) -> Result<(), BusError> {
        let mut state = self.lock()?;
        if state.fail_publishes {
            return Err(BusError::publish_failed(destination, "publishing disabled"));
        }
        let Some(queue) = state.queues.get_mut(destination) else {
            drop(state);
            debug!(
                target: BUS_TARGET,
                exchange = %self.shared.exchange,
                destination,
                "no such queue; message discarded"
            );
            return Ok(());
        };
        queue.ready.push_back(Message {
            routing_key: destination.to_owned(),
            payload: payload.to_vec(),
            reply_to: None,
            headers: Headers::new(),
            redelivered: false,
        });
        drop(state);
        self.shared.arrivals.notify_all();
        trace!(target: BUS_TARGET, destination, bytes = payload.len(), "published direct");
        Ok(())
    }

    /// Routes `payload` to every queue bound with a matching pattern.
    ///
    /// Messages that match no binding are discarded.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::PublishFailed`] while publish failures are being
    /// injected.
    pub fn publish_topic(
        &self,
        routing_key: &str,
        payload: &[u8],
        properties: &PublishProperties,
    ) -> Result<(), BusError> {
        let mut state = self.lock()?;
        if state.fail_publishes {
            return Err(BusError::publish_failed(routing_key, "publishing disabled"));
        }
        let message = Message {
            routing_key: routing_key.to_owned(),
            payload: payload.to_vec(),
            reply_to: properties.reply_to.clone(),
            headers: properties.headers.clone(),
            redelivered: false,
        };
        let mut routed = 0_usize;
        for queue in state.queues.values_mut() {
            if queue
                .bindings
                .iter()
                .any(|pattern| topic_matches(pattern, routing_key))
            {
                queue.ready.push_back(message.clone());
                routed += 1;
            }
        }
        drop(state);
        if routed == 0 {
            debug!(
                target: BUS_TARGET,
                exchange = %self.shared.exchange,
                routing_key,
                "no queue bound for routing key; message discarded"
            );
        } else {
            self.shared.arrivals.notify_all();
        }
        Ok(())
    }

    fn next_delivery(&self, queue: &str, timeout: Duration) -> Result<Option<Delivery>, BusError> {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.lock()?;
        loop {
            if let Some(delivery) = Self::take_ready(&mut state, queue) {
                return Ok(Some(delivery));
            }
            let remaining = deadline.map_or(timeout, |at| {
                at.saturating_duration_since(Instant::now())
            });
            if remaining.is_zero() {
                return Ok(None);
            }
            let (guard, _) = self
                .shared
                .arrivals
                .wait_timeout(state, remaining)
                .map_err(|_| BusError::Poisoned)?;
            state = guard;
        }
    }

    fn take_ready(state: &mut State, queue: &str) -> Option<Delivery> {
        let message = state.queues.get_mut(queue)?.ready.pop_front()?;
        let tag = state.next_tag;
        state.next_tag += 1;
        let delivery = Delivery {
            tag,
            routing_key: message.routing_key.clone(),
            payload: message.payload.clone(),
            reply_to: message.reply_to.clone(),
            headers: message.headers.clone(),
            redelivered: message.redelivered,
        };
        state.unsettled.insert(
            tag,
            Unsettled {
                queue: queue.to_owned(),
                message,
            },
        );
        Some(delivery)
    }

    fn acknowledge(&self, tag: DeliveryTag) -> Result<(), BusError> {
        self.lock()?
            .unsettled
            .remove(&tag)
            .map(|_| ())
            .ok_or(BusError::UnknownDeliveryTag { tag })
    }

    fn reject(&self, tag: DeliveryTag, requeue: bool) -> Result<(), BusError> {
        let mut state = self.lock()?;
        let unsettled = state
            .unsettled
            .remove(&tag)
            .ok_or(BusError::UnknownDeliveryTag { tag })?;
        if !requeue {
            debug!(target: BUS_TARGET, tag, queue = %unsettled.queue, "delivery discarded");
            return Ok(());
        }
        let Unsettled { queue, mut message } = unsettled;
        let Some(entry) = state.queues.get_mut(&queue) else {
            debug!(target: BUS_TARGET, tag, queue = %queue, "queue deleted; delivery discarded");
            return Ok(());
        };
        message.redelivered = true;
        entry.ready.push_front(message);
        drop(state);
        self.shared.arrivals.notify_all();
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, BusError> {
        self.shared.state.lock().map_err(|_| BusError::Poisoned)
    }
}

/// A [`Bus`] subscription to one queue of a [`MemoryBus`].
#[derive(Debug, Clone)]
pub struct QueueConsumer {
    bus: MemoryBus,
    queue: String,
}

impl QueueConsumer {
    /// Name of the subscribed queue.
    #[must_use]
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// The exchange this subscription belongs to.
    #[must_use]
    pub const fn bus(&self) -> &MemoryBus {
        &self.bus
    }
}

impl Bus for QueueConsumer {
    fn next_delivery(&self, timeout: Duration) -> Result<Option<Delivery>, BusError> {
        self.bus.next_delivery(&self.queue, timeout)
    }

    fn publish(&self, destination: &str, payload: &[u8]) -> Result<(), BusError> {
        self.bus.publish(destination, payload)
    }

    fn publish_topic(
        &self,
        routing_key: &str,
        payload: &[u8],
        properties: &PublishProperties,
    ) -> Result<(), BusError> {
        self.bus.publish_topic(routing_key, payload, properties)
    }

    fn acknowledge(&self, tag: DeliveryTag) -> Result<(), BusError> {
        self.bus.acknowledge(tag)
    }

    fn reject(&self, tag: DeliveryTag, requeue: bool) -> Result<(), BusError> {
        self.bus.reject(tag, requeue)
    }
}
