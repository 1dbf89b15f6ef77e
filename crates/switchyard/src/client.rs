//! Calling other services over the bus.
//!
//! [`RemoteCaller`] publishes a request to the topic exchange, naming its
//! own reply queue, and waits for the response carrying the same id. Replies
//! for other ids (late answers to calls that already timed out) are
//! acknowledged and skipped. A caller built by
//! [`RemoteCaller::on_memory_bus`] owns its reply queue and deletes it when
//! dropped; replies arriving after that are discarded by the exchange.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::bus::{Bus, BusError, Delivery, MemoryBus, PublishProperties, QueueConsumer};
use crate::envelope::{Envelope, Notification, Params, Request, RequestId};
use crate::registry::RemoteError;

/// Tracing target for outbound calls.
pub(crate) const CLIENT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::client");

/// Process-wide sequence shared by request ids and reply queue names.
static SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_sequence() -> u64 {
    SEQUENCE.fetch_add(1, Ordering::SeqCst)
}

/// Generates a request id unique within this process and distinct from
/// other processes' ids.
#[must_use]
pub fn next_request_id() -> RequestId {
    RequestId::String(format!("{}-{}", std::process::id(), next_sequence()))
}

/// Generates a private reply queue name for the caller called `name`.
#[must_use]
pub fn reply_queue_name(name: &str) -> String {
    format!("{name}.reply.{}.{}", std::process::id(), next_sequence())
}

/// Failures of an outbound call.
#[derive(Debug, Error)]
pub enum CallError {
    /// The bus refused the request or failed while waiting for the reply.
    #[error("bus failure during call: {0}")]
    Bus(#[from] BusError),
    /// The remote service answered with an error.
    #[error("remote error: {0}")]
    Remote(RemoteError),
    /// No reply arrived in time.
    #[error("no reply to '{method}' within {timeout:?}")]
    Timeout {
        /// Method that was called.
        method: String,
        /// How long the caller waited.
        timeout: Duration,
    },
}

/// Sends requests and notifications, receiving replies on a private queue.
#[derive(Debug)]
pub struct RemoteCaller<B> {
    bus: B,
    reply_queue: String,
    _owned_queue: Option<OwnedReplyQueue>,
}

/// A reply queue deleted together with the caller that declared it.
#[derive(Debug)]
struct OwnedReplyQueue {
    bus: MemoryBus,
    queue: String,
}

impl Drop for OwnedReplyQueue {
    fn drop(&mut self) {
        match self.bus.delete_queue(&self.queue) {
            Ok(discarded) => debug!(
                target: CLIENT_TARGET,
                queue = %self.queue,
                discarded,
                "reply queue deleted"
            ),
            Err(error) => warn!(
                target: CLIENT_TARGET,
                queue = %self.queue,
                %error,
                "failed to delete reply queue"
            ),
        }
    }
}

impl RemoteCaller<QueueConsumer> {
    /// Creates a caller on `bus` with a freshly named reply queue, deleted
    /// again when the caller is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`BusError`] if the reply queue cannot be declared.
    pub fn on_memory_bus(bus: &MemoryBus, name: &str) -> Result<Self, BusError> {
        let reply_queue = reply_queue_name(name);
        let consumer = bus.consumer(&reply_queue)?;
        Ok(Self {
            bus: consumer,
            _owned_queue: Some(OwnedReplyQueue {
                bus: bus.clone(),
                queue: reply_queue.clone(),
            }),
            reply_queue,
        })
    }
}

impl<B: Bus> RemoteCaller<B> {
    /// Creates a caller whose `bus` subscription consumes `reply_queue`.
    ///
    /// The queue stays declared after the caller is dropped.
    pub fn new(bus: B, reply_queue: impl Into<String>) -> Self {
        Self {
            bus,
            reply_queue: reply_queue.into(),
            _owned_queue: None,
        }
    }

    /// Queue replies are addressed to.
    #[must_use]
    pub fn reply_queue(&self) -> &str {
        &self.reply_queue
    }

    /// Calls `method` on whichever service consumes `routing_key`.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::Remote`] when the service answers with an error,
    /// [`CallError::Timeout`] when no matching reply arrives within
    /// `timeout`, and [`CallError::Bus`] when the bus fails.
    pub fn call(
        &self,
        routing_key: &str,
        method: &str,
        params: Params,
        timeout: Duration,
    ) -> Result<Value, CallError> {
        let request = Request::new(next_request_id(), method, params);
        debug!(
            target: CLIENT_TARGET,
            routing_key,
            method,
            id = %request.id,
            reply_queue = %self.reply_queue,
            "sending request"
        );
        self.bus.publish_topic(
            routing_key,
            &request.encode(),
            &PublishProperties::reply_to(&self.reply_queue),
        )?;

        let deadline = Instant::now().checked_add(timeout);
        loop {
            let remaining =
                deadline.map_or(timeout, |at| at.saturating_duration_since(Instant::now()));
            if remaining.is_zero() {
                return Err(CallError::Timeout {
                    method: method.to_owned(),
                    timeout,
                });
            }
            let Some(delivery) = self.bus.next_delivery(remaining)? else {
                continue;
            };
            self.bus.acknowledge(delivery.tag)?;
            if let Some(answer) = match_reply(&delivery, &request.id) {
                return answer.map_err(CallError::Remote);
            }
        }
    }

    /// Sends `method` as a notification; nothing is awaited.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::Bus`] when the bus refuses the message.
    pub fn notify(&self, routing_key: &str, method: &str, params: Params) -> Result<(), CallError> {
        debug!(target: CLIENT_TARGET, routing_key, method, "sending notification");
        self.bus.publish_topic(
            routing_key,
            &Notification::new(method, params).encode(),
            &PublishProperties::default(),
        )?;
        Ok(())
    }
}

/// Interprets a reply delivery, returning `None` if it answers another call.
fn match_reply(delivery: &Delivery, expected: &RequestId) -> Option<Result<Value, RemoteError>> {
    match Envelope::decode(&delivery.payload) {
        Ok(Envelope::Response(response)) if response.id == *expected => Some(Ok(response.result)),
        Ok(Envelope::ErrorResponse(response)) if response.id == *expected => {
            Some(Err(RemoteError::from(response.error)))
        }
        Ok(envelope) => {
            warn!(
                target: CLIENT_TARGET,
                expected = %expected,
                received = ?envelope.id(),
                kind = envelope.kind(),
                "skipping reply with non-matching id"
            );
            None
        }
        Err(error) => {
            warn!(
                target: CLIENT_TARGET,
                expected = %expected,
                %error,
                "skipping undecodable reply"
            );
            None
        }
    }
}
