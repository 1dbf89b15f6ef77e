//! The handler capability surface.

use std::error::Error as StdError;
use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::bus::{DeliveryTag, Headers};
use crate::envelope::{ErrorObject, Params, ParamsError, RequestId};

/// Per-delivery facts a handler may inspect.
#[derive(Debug, Clone, Copy)]
pub struct MessageContext<'a> {
    /// Routing key the message was published with.
    pub routing_key: &'a str,
    /// Method resolved from the routing key.
    pub method: &'a str,
    /// Bus tag of the delivery being handled.
    pub delivery_tag: DeliveryTag,
    /// Destination the reply will be published to, if any.
    pub reply_to: Option<&'a str>,
    /// Transport headers carried with the message.
    pub headers: &'a Headers,
    /// Identifier of the request; `None` for notifications.
    pub request_id: Option<&'a RequestId>,
    /// Whether the bus has delivered this message before.
    pub redelivered: bool,
}

impl MessageContext<'_> {
    /// Returns `true` when the message is a notification.
    #[must_use]
    pub const fn is_notification(&self) -> bool {
        self.request_id.is_none()
    }
}

/// Value returned by a handler.
pub type HandlerResult = Result<Value, HandlerFailure>;

/// A callable bound to one method.
///
/// Plain functions and closures with the signature
/// `Fn(&MessageContext<'_>, Params) -> HandlerResult` implement this trait.
pub trait Handler: Send + Sync {
    /// Handles one message.
    fn call(&self, context: &MessageContext<'_>, params: Params) -> HandlerResult;
}

impl<F> Handler for F
where
    F: Fn(&MessageContext<'_>, Params) -> HandlerResult + Send + Sync,
{
    fn call(&self, context: &MessageContext<'_>, params: Params) -> HandlerResult {
        self(context, params)
    }
}

/// Pins a closure to the handler signature so its argument types are
/// inferred.
///
/// # Examples
///
/// ```rust
/// use serde_json::json;
/// use switchyard::registry::{HandlerRegistryBuilder, handler_fn};
///
/// let registry = HandlerRegistryBuilder::new()
///     .on("ping", handler_fn(|_, _| Ok(json!("pong"))))
///     .build();
/// assert!(registry.is_ok());
/// ```
pub const fn handler_fn<F>(function: F) -> F
where
    F: Fn(&MessageContext<'_>, Params) -> HandlerResult + Send + Sync,
{
    function
}

/// An application error a handler chose to report on the wire.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} (code {code})")]
pub struct RemoteError {
    /// Application error code, carried verbatim.
    pub code: i64,
    /// Human-readable message, carried verbatim.
    pub message: String,
    /// Optional structured detail.
    pub data: Option<Value>,
}

impl RemoteError {
    /// Creates an error without detail.
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Attaches structured detail.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl From<RemoteError> for ErrorObject {
    fn from(error: RemoteError) -> Self {
        Self {
            code: error.code,
            message: error.message,
            data: error.data,
        }
    }
}

impl From<ErrorObject> for RemoteError {
    fn from(error: ErrorObject) -> Self {
        Self {
            code: error.code,
            message: error.message,
            data: error.data,
        }
    }
}

/// An undeclared failure inside a handler.
pub struct InternalFailure {
    kind: String,
    error: Box<dyn StdError + Send + Sync + 'static>,
}

impl InternalFailure {
    /// Short type name of the underlying failure.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The underlying failure.
    #[must_use]
    pub fn error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.error.as_ref()
    }

    /// Renders the failure and its causes, one per line.
    #[must_use]
    pub fn traceback(&self) -> String {
        let mut rendered = format!("{}: {}", self.kind, self.error);
        let mut source = self.error.source();
        while let Some(cause) = source {
            rendered.push_str("\ncaused by: ");
            rendered.push_str(&cause.to_string());
            source = cause.source();
        }
        rendered
    }
}

impl fmt::Debug for InternalFailure {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("InternalFailure")
            .field("kind", &self.kind)
            .field("error", &self.error)
            .finish()
    }
}

impl fmt::Display for InternalFailure {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}: {}", self.kind, self.error)
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
struct Message(String);

/// Ways a handler can fail.
#[derive(Debug, Error)]
pub enum HandlerFailure {
    /// A declared application error, sent to the caller verbatim.
    #[error("declared error: {0}")]
    Declared(RemoteError),
    /// An unexpected failure, reported as an internal error.
    #[error("internal failure: {0}")]
    Internal(InternalFailure),
    /// The parameters did not fit the handler.
    #[error("invalid params: {message}")]
    InvalidParams {
        /// What was wrong with the parameters.
        message: String,
    },
}

impl HandlerFailure {
    /// Creates a declared application error.
    pub fn declared(code: i64, message: impl Into<String>) -> Self {
        Self::Declared(RemoteError::new(code, message))
    }

    /// Wraps any error as an internal failure, keeping its source chain.
    pub fn internal<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Internal(InternalFailure {
            kind: short_type_name::<E>().to_owned(),
            error: Box::new(error),
        })
    }

    /// Creates an internal failure from a message.
    pub fn message(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Internal(InternalFailure {
            kind: kind.into(),
            error: Box::new(Message(message.into())),
        })
    }

    /// Creates an invalid params failure.
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams {
            message: message.into(),
        }
    }
}

impl From<RemoteError> for HandlerFailure {
    fn from(error: RemoteError) -> Self {
        Self::Declared(error)
    }
}

impl From<ParamsError> for HandlerFailure {
    fn from(error: ParamsError) -> Self {
        Self::invalid_params(error.to_string())
    }
}

/// Last path segment of a type name, without generic arguments.
fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
