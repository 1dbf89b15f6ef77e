//! The message bus seam.
//!
//! The dispatch engine never talks to a broker directly. It consumes
//! deliveries, publishes replies and settles deliveries through [`Bus`],
//! which a broker client implements for one queue subscription.
//! [`MemoryBus`] is the in-process topic exchange used by tests and
//! single-process services.

mod memory;
mod topic;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

pub use self::memory::{MemoryBus, QueueConsumer};
pub use self::topic::topic_matches;

/// Tracing target for bus operations.
pub(crate) const BUS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::bus");

/// Broker-assigned identifier of one delivery.
pub type DeliveryTag = u64;

/// Transport headers carried alongside a payload.
pub type Headers = BTreeMap<String, String>;

/// A message handed to a consumer, awaiting settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Tag used to acknowledge or reject the delivery.
    pub tag: DeliveryTag,
    /// Routing key the message was published with.
    pub routing_key: String,
    /// Raw message body.
    pub payload: Vec<u8>,
    /// Destination for the reply, if the publisher asked for one.
    pub reply_to: Option<String>,
    /// Transport headers.
    pub headers: Headers,
    /// Whether the bus delivered this message before.
    pub redelivered: bool,
}

impl Delivery {
    /// Builds a first-time delivery without a reply destination or headers.
    pub fn new(tag: DeliveryTag, routing_key: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            tag,
            routing_key: routing_key.into(),
            payload: payload.into(),
            reply_to: None,
            headers: Headers::new(),
            redelivered: false,
        }
    }

    /// Sets the reply destination.
    #[must_use]
    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }
}

/// Message properties attached when publishing to the exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishProperties {
    /// Queue the consumer should reply to.
    pub reply_to: Option<String>,
    /// Transport headers.
    pub headers: Headers,
}

impl PublishProperties {
    /// Properties asking for a reply on `queue`.
    pub fn reply_to(queue: impl Into<String>) -> Self {
        Self {
            reply_to: Some(queue.into()),
            headers: Headers::new(),
        }
    }
}

/// Errors reported by a bus implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// The connection to the broker is unavailable.
    #[error("bus connection unavailable: {message}")]
    Disconnected {
        /// Description of the connection failure.
        message: String,
    },
    /// A publish was refused.
    #[error("failed to publish to '{destination}': {message}")]
    PublishFailed {
        /// Queue or routing key the publish targeted.
        destination: String,
        /// Description of the failure.
        message: String,
    },
    /// The tag does not name an unsettled delivery.
    #[error("unknown delivery tag {tag}")]
    UnknownDeliveryTag {
        /// The offending tag.
        tag: DeliveryTag,
    },
    /// The configured transport is not available in this build.
    #[error("unsupported bus transport: {transport}")]
    UnsupportedTransport {
        /// Transport named by the bus URI.
        transport: String,
    },
    /// Internal bus state was poisoned by a panicking thread.
    #[error("bus state lock poisoned")]
    Poisoned,
}

impl BusError {
    /// Creates a disconnected error.
    pub fn disconnected(message: impl Into<String>) -> Self {
        Self::Disconnected {
            message: message.into(),
        }
    }

    /// Creates a publish failure.
    pub fn publish_failed(destination: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PublishFailed {
            destination: destination.into(),
            message: message.into(),
        }
    }
}

/// One queue subscription on a message bus.
pub trait Bus: Send + Sync {
    /// Waits up to `timeout` for the next delivery on the subscribed queue.
    ///
    /// # Errors
    ///
    /// Returns [`BusError`] when the broker cannot be reached.
    fn next_delivery(&self, timeout: Duration) -> Result<Option<Delivery>, BusError>;

    /// Puts `payload` directly onto the queue named `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`BusError`] when the broker refuses the message.
    fn publish(&self, destination: &str, payload: &[u8]) -> Result<(), BusError>;

    /// Publishes `payload` to the topic exchange under `routing_key`.
    ///
    /// # Errors
    ///
    /// Returns [`BusError`] when the broker refuses the message.
    fn publish_topic(
        &self,
        routing_key: &str,
        payload: &[u8],
        properties: &PublishProperties,
    ) -> Result<(), BusError>;

    /// Settles a delivery as processed.
    ///
    /// # Errors
    ///
    /// Returns [`BusError`] when the tag is unknown or the broker is
    /// unreachable.
    fn acknowledge(&self, tag: DeliveryTag) -> Result<(), BusError>;

    /// Settles a delivery as refused, optionally returning it to the queue.
    ///
    /// # Errors
    ///
    /// Returns [`BusError`] when the tag is unknown or the broker is
    /// unreachable.
    fn reject(&self, tag: DeliveryTag, requeue: bool) -> Result<(), BusError>;
}

impl<T> Bus for Arc<T>
where
    T: Bus + ?Sized,
{
    fn next_delivery(&self, timeout: Duration) -> Result<Option<Delivery>, BusError> {
        (**self).next_delivery(timeout)
    }

    fn publish(&self, destination: &str, payload: &[u8]) -> Result<(), BusError> {
        (**self).publish(destination, payload)
    }

    fn publish_topic(
        &self,
        routing_key: &str,
        payload: &[u8],
        properties: &PublishProperties,
    ) -> Result<(), BusError> {
        (**self).publish_topic(routing_key, payload, properties)
    }

    fn acknowledge(&self, tag: DeliveryTag) -> Result<(), BusError> {
        (**self).acknowledge(tag)
    }

    fn reject(&self, tag: DeliveryTag, requeue: bool) -> Result<(), BusError> {
        (**self).reject(tag, requeue)
    }
}
