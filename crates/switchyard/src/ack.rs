//! Settling deliveries once their dispatch completes.
//!
//! Every delivery is settled exactly once. By default that settlement is an
//! acknowledgment whatever the outcome: a message that failed once will fail
//! again, so returning it to the queue would only block the messages behind
//! it. Services that would rather retry when the reply could not be
//! published opt into [`AckPolicy::RequeueOnPublishFailure`].

use tracing::{debug, warn};

use crate::bus::{Bus, BusError, Delivery};
use crate::dispatch::{DispatchOutcome, Dispatched};

/// Tracing target for acknowledgment operations.
pub(crate) const ACK_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::ack");

/// What happened to the reply of a dispatched delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    /// No reply was due, or there was nowhere to send it.
    NotRequired,
    /// The reply was published.
    Published,
    /// Publishing the reply failed.
    Failed,
}

/// How a delivery is settled on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The delivery is acknowledged and removed from the queue.
    Ack,
    /// The delivery is refused.
    Reject {
        /// Whether the bus should deliver the message again.
        requeue: bool,
    },
}

/// Chooses a [`Disposition`] for each completed dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AckPolicy {
    /// Acknowledge every delivery, never requeue.
    #[default]
    AlwaysAck,
    /// Acknowledge every delivery except those whose reply could not be
    /// published, which are requeued.
    RequeueOnPublishFailure,
}

impl AckPolicy {
    /// The opt-in policy that retries deliveries whose reply was lost.
    #[must_use]
    pub const fn requeue_on_publish_failure() -> Self {
        Self::RequeueOnPublishFailure
    }

    /// Decides how to settle a delivery.
    #[must_use]
    pub const fn decide(self, outcome: &DispatchOutcome, reply: ReplyStatus) -> Disposition {
        match (self, outcome, reply) {
            (Self::RequeueOnPublishFailure, _, ReplyStatus::Failed) => {
                Disposition::Reject { requeue: true }
            }
            _ => Disposition::Ack,
        }
    }
}

/// Publishes replies and settles deliveries.
#[derive(Debug, Clone, Copy, Default)]
pub struct AckController {
    policy: AckPolicy,
}

impl AckController {
    /// Creates a controller applying `policy`.
    #[must_use]
    pub const fn new(policy: AckPolicy) -> Self {
        Self { policy }
    }

    /// The policy in force.
    #[must_use]
    pub const fn policy(&self) -> AckPolicy {
        self.policy
    }

    /// Publishes the reply, if any, then settles the delivery exactly once.
    ///
    /// A failed reply publish is logged and fed to the policy rather than
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns the [`BusError`] raised while acknowledging or rejecting. The
    /// controller does not retry.
    pub fn settle<B>(
        &self,
        bus: &B,
        delivery: &Delivery,
        dispatched: &Dispatched,
    ) -> Result<Disposition, BusError>
    where
        B: Bus + ?Sized,
    {
        let reply = match (&dispatched.reply, delivery.reply_to.as_deref()) {
            (Some(payload), Some(destination)) => match bus.publish(destination, payload) {
                Ok(()) => {
                    debug!(
                        target: ACK_TARGET,
                        tag = delivery.tag,
                        destination,
                        "reply published"
                    );
                    ReplyStatus::Published
                }
                Err(error) => {
                    warn!(
                        target: ACK_TARGET,
                        tag = delivery.tag,
                        destination,
                        %error,
                        "failed to publish reply"
                    );
                    ReplyStatus::Failed
                }
            },
            _ => ReplyStatus::NotRequired,
        };

        let disposition = self.policy.decide(&dispatched.outcome, reply);
        match disposition {
            Disposition::Ack => bus.acknowledge(delivery.tag)?,
            Disposition::Reject { requeue } => bus.reject(delivery.tag, requeue)?,
        }
        debug!(
            target: ACK_TARGET,
            tag = delivery.tag,
            outcome = dispatched.outcome.kind(),
            ?reply,
            ?disposition,
            "delivery settled"
        );
        Ok(disposition)
    }
}
