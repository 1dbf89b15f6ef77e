//! Routing-key resolution.
//!
//! A routing key is a dot-delimited string such as `svc.jobs.add`. Only the
//! final segment carries meaning to the dispatcher: it names the method. The
//! preceding segments select queues on the exchange and are opaque here.

use thiserror::Error;

/// Failures resolving a routing key to a method name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    /// The key is empty or ends with an empty segment.
    #[error("routing key '{routing_key}' does not name a method")]
    Unroutable {
        /// The offending routing key.
        routing_key: String,
    },
}

impl RoutingError {
    /// Creates an unroutable key error.
    pub fn unroutable(routing_key: impl Into<String>) -> Self {
        Self::Unroutable {
            routing_key: routing_key.into(),
        }
    }
}

/// Returns the method named by the final segment of `routing_key`.
///
/// # Errors
///
/// Returns [`RoutingError::Unroutable`] when the key is empty or its final
/// segment is empty, as in `svc.jobs.`.
///
/// # Examples
///
/// ```rust
/// use switchyard::routing::resolve;
///
/// assert_eq!(resolve("svc.jobs.add"), Ok("add"));
/// assert!(resolve("svc.jobs.").is_err());
/// ```
pub fn resolve(routing_key: &str) -> Result<&str, RoutingError> {
    match routing_key.rsplit('.').next() {
        Some(method) if !method.is_empty() => Ok(method),
        _ => Err(RoutingError::unroutable(routing_key)),
    }
}
