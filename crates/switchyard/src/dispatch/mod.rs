//! The dispatch cycle for one delivery.
//!
//! A delivery moves through `Received → Decoded → Resolved → Invoked →
//! Completed`, and any failure short-circuits straight to `Completed`. The
//! cycle never returns an error: every failure becomes a
//! [`DispatchOutcome`], plus an error reply when the caller is owed one.
//!
//! ## Replies
//!
//! Requests are answered on the delivery's `reply_to` destination:
//!
//! ```json
//! {"jsonrpc":"2.0","id":"1","result":3}
//! {"jsonrpc":"2.0","id":"2","error":{"code":-32601,"message":"Method not found","data":{"exception":"MethodNotFound"}}}
//! ```
//!
//! Notifications are never answered, whatever happens while handling them.

mod dispatcher;
mod outcome;

pub use self::dispatcher::Dispatcher;
pub(crate) use self::dispatcher::panic_message;
pub use self::outcome::{DispatchOutcome, Dispatched};

/// Tracing target for dispatch operations.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
