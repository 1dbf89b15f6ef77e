//! Decode, resolve, look up, invoke, encode.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::bus::Delivery;
use crate::envelope::{
    Envelope, ErrorObject, Params, RequestId, StandardError, encode_error_object,
    encode_response, error_data,
};
use crate::registry::{HandlerFailure, HandlerRegistry, MessageContext};
use crate::routing;

use super::DISPATCH_TARGET;
use super::outcome::{DispatchOutcome, Dispatched};

/// Failure kind reported in `error.data.exception` for unroutable keys.
const UNROUTABLE_KIND: &str = "UnroutableKey";
/// Failure kind reported in `error.data.exception` for unbound methods.
const METHOD_NOT_FOUND_KIND: &str = "MethodNotFound";
/// Failure kind reported in `error.data.exception` for rejected arguments.
const INVALID_PARAMS_KIND: &str = "InvalidParams";
/// Failure kind reported in `error.data.exception` for handler panics.
const PANIC_KIND: &str = "Panic";

/// Turns deliveries into outcomes and replies.
///
/// The dispatcher holds nothing but a shared, read-only registry, so any
/// number of workers may dispatch through clones of it concurrently.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
}

/// A call that has been decoded and whose routing key agrees with it.
struct Call<'a> {
    delivery: &'a Delivery,
    id: Option<RequestId>,
    method: &'a str,
}

impl Dispatcher {
    /// Creates a dispatcher over `registry`.
    #[must_use]
    pub const fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self { registry }
    }

    /// The bindings this dispatcher resolves methods against.
    #[must_use]
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Runs one delivery through the dispatch cycle.
    ///
    /// Never fails: every error is folded into the returned outcome, and a
    /// panicking handler is contained here.
    #[must_use]
    pub fn dispatch(&self, delivery: &Delivery) -> Dispatched {
        debug!(
            target: DISPATCH_TARGET,
            tag = delivery.tag,
            routing_key = %delivery.routing_key,
            bytes = delivery.payload.len(),
            redelivered = delivery.redelivered,
            "received delivery"
        );

        let envelope = match Envelope::decode(&delivery.payload) {
            Ok(envelope) => envelope,
            Err(failure) => {
                let standard = failure.standard_error();
                warn!(
                    target: DISPATCH_TARGET,
                    tag = delivery.tag,
                    routing_key = %delivery.routing_key,
                    error = %failure,
                    "rejecting malformed message"
                );
                let error =
                    ErrorObject::standard(standard, Some(error_data(Some(failure.kind()), None)));
                return Dispatched {
                    outcome: DispatchOutcome::ProtocolError {
                        code: standard.code(),
                        reason: failure.to_string(),
                    },
                    reply: reply_to_caller(delivery, Some(&RequestId::Null), || {
                        encode_error_object(&RequestId::Null, &error)
                    }),
                };
            }
        };

        let (id, method, params) = match envelope {
            Envelope::Request(request) => (Some(request.id), request.method, request.params),
            Envelope::Notification(notification) => {
                (None, notification.method, notification.params)
            }
            Envelope::Response(_) | Envelope::ErrorResponse(_) => {
                error!(
                    target: DISPATCH_TARGET,
                    tag = delivery.tag,
                    routing_key = %delivery.routing_key,
                    kind = envelope.kind(),
                    "dropping reply envelope delivered to a service queue"
                );
                return Dispatched::silent(DispatchOutcome::Unroutable {
                    reason: format!("{} envelopes are not dispatched", envelope.kind()),
                });
            }
        };

        let resolved = match routing::resolve(&delivery.routing_key) {
            Ok(resolved) => resolved,
            Err(failure) => {
                warn!(
                    target: DISPATCH_TARGET,
                    tag = delivery.tag,
                    error = %failure,
                    "rejecting message with unroutable key"
                );
                let error = ErrorObject::standard(
                    StandardError::InvalidRequest,
                    Some(error_data(Some(UNROUTABLE_KIND), None)),
                );
                return Dispatched {
                    outcome: DispatchOutcome::ProtocolError {
                        code: error.code,
                        reason: failure.to_string(),
                    },
                    reply: id.as_ref().and_then(|request_id| {
                        reply_to_caller(delivery, Some(request_id), || {
                            encode_error_object(request_id, &error)
                        })
                    }),
                };
            }
        };

        if resolved != method {
            error!(
                target: DISPATCH_TARGET,
                tag = delivery.tag,
                routing_key = %delivery.routing_key,
                method = %method,
                reply_to = ?delivery.reply_to,
                "dropping message whose method does not match its routing key"
            );
            return Dispatched::silent(DispatchOutcome::Unroutable {
                reason: format!(
                    "method '{method}' does not match routing key '{}'",
                    delivery.routing_key
                ),
            });
        }

        self.invoke(
            Call {
                delivery,
                id,
                method: resolved,
            },
            params,
        )
    }

    fn invoke(&self, call: Call<'_>, params: Params) -> Dispatched {
        let Call {
            delivery,
            id,
            method,
        } = call;

        let Ok(handler) = self.registry.lookup(method) else {
            let Some(request_id) = id else {
                debug!(
                    target: DISPATCH_TARGET,
                    tag = delivery.tag,
                    method,
                    "no handler for notification; ignoring"
                );
                return Dispatched::silent(DispatchOutcome::Success);
            };
            warn!(
                target: DISPATCH_TARGET,
                tag = delivery.tag,
                method,
                id = %request_id,
                "method not found"
            );
            let error = ErrorObject::standard(
                StandardError::MethodNotFound,
                Some(error_data(Some(METHOD_NOT_FOUND_KIND), None)),
            );
            return Dispatched {
                outcome: DispatchOutcome::ProtocolError {
                    code: error.code,
                    reason: format!("method not found: {method}"),
                },
                reply: reply_to_caller(delivery, Some(&request_id), || {
                    encode_error_object(&request_id, &error)
                }),
            };
        };

        let context = MessageContext {
            routing_key: &delivery.routing_key,
            method,
            delivery_tag: delivery.tag,
            reply_to: delivery.reply_to.as_deref(),
            headers: &delivery.headers,
            request_id: id.as_ref(),
            redelivered: delivery.redelivered,
        };

        let result = panic::catch_unwind(AssertUnwindSafe(|| handler.call(&context, params)));

        let (outcome, reply_error, value) = match result {
            Ok(Ok(value)) => (DispatchOutcome::Success, None, value),
            Ok(Err(failure)) => {
                let error = failure_to_error(&failure);
                warn!(
                    target: DISPATCH_TARGET,
                    tag = delivery.tag,
                    method,
                    id = ?id,
                    code = error.code,
                    error = %failure,
                    traceback = ?traceback_of(&failure),
                    "handler failed"
                );
                let outcome = DispatchOutcome::HandlerError {
                    code: error.code,
                    failure: failure.to_string(),
                };
                (outcome, Some(error), Value::Null)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(
                    target: DISPATCH_TARGET,
                    tag = delivery.tag,
                    method,
                    id = ?id,
                    panic = %message,
                    "handler panicked"
                );
                let error = ErrorObject::standard(
                    StandardError::InternalError,
                    Some(error_data(Some(PANIC_KIND), Some(&message))),
                );
                let outcome = DispatchOutcome::HandlerError {
                    code: error.code,
                    failure: format!("handler panicked: {message}"),
                };
                (outcome, Some(error), Value::Null)
            }
        };

        let Some(request_id) = id else {
            debug!(
                target: DISPATCH_TARGET,
                tag = delivery.tag,
                method,
                outcome = outcome.kind(),
                "notification handled"
            );
            return Dispatched::silent(outcome);
        };

        debug!(
            target: DISPATCH_TARGET,
            tag = delivery.tag,
            method,
            id = %request_id,
            outcome = outcome.kind(),
            "request handled"
        );
        let reply = reply_to_caller(delivery, Some(&request_id), || match &reply_error {
            Some(error) => encode_error_object(&request_id, error),
            None => encode_response(&request_id, &value),
        });
        Dispatched { outcome, reply }
    }
}

/// Encodes a reply only when the delivery names somewhere to send it.
fn reply_to_caller(
    delivery: &Delivery,
    id: Option<&RequestId>,
    encode: impl FnOnce() -> Vec<u8>,
) -> Option<Vec<u8>> {
    if delivery.reply_to.is_some() {
        return Some(encode());
    }
    debug!(
        target: DISPATCH_TARGET,
        tag = delivery.tag,
        id = ?id,
        "no reply destination; dropping reply"
    );
    None
}

fn failure_to_error(failure: &HandlerFailure) -> ErrorObject {
    match failure {
        HandlerFailure::Declared(remote) => ErrorObject::from(remote.clone()),
        HandlerFailure::Internal(internal) => ErrorObject::standard(
            StandardError::InternalError,
            Some(error_data(Some(internal.kind()), Some(&internal.traceback()))),
        ),
        HandlerFailure::InvalidParams { message } => ErrorObject::standard(
            StandardError::InvalidParams,
            Some(error_data(Some(INVALID_PARAMS_KIND), Some(message))),
        ),
    }
}

fn traceback_of(failure: &HandlerFailure) -> Option<String> {
    match failure {
        HandlerFailure::Internal(internal) => Some(internal.traceback()),
        HandlerFailure::Declared(_) | HandlerFailure::InvalidParams { .. } => None,
    }
}

/// Extracts the message a panic was raised with.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned())
}
