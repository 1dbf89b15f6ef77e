//! Bus-message dispatch for long-running worker services.
//!
//! A Switchyard service consumes JSON-RPC 2.0 requests and notifications
//! from queues bound to a topic exchange. The final dot-delimited segment of
//! each routing key names the method; the method is looked up in an
//! immutable [`HandlerRegistry`] built from `on_<action>` capabilities, the
//! handler runs, and its result or failure is published back to the
//! caller's reply queue as a JSON-RPC response.
//!
//! Every delivery is acknowledged exactly once, including deliveries that
//! fail, so one bad message never blocks or corrupts the stream behind it.
//!
//! ## Layout
//!
//! - [`envelope`] parses and serialises JSON-RPC 2.0 messages.
//! - [`routing`] maps a routing key to a method name.
//! - [`registry`] binds methods to handlers.
//! - [`dispatch`] runs one delivery through decode, resolve, invoke, encode.
//! - [`ack`] publishes replies and settles deliveries.
//! - [`bus`] is the message bus seam, with an in-process [`MemoryBus`].
//! - [`service`] and [`manager`] run and supervise worker threads.
//! - [`client`] calls other services over the bus.
//!
//! ## Startup
//!
//! [`bootstrap_with`] loads configuration through `ortho_config`,
//! validates it, installs structured telemetry, and reports each step to a
//! [`HealthReporter`].

pub mod ack;
mod bootstrap;
pub mod bus;
pub mod client;
pub mod dispatch;
pub mod envelope;
mod health;
pub mod manager;
pub mod registry;
pub mod routing;
pub mod service;
pub mod telemetry;

pub use ack::{AckController, AckPolicy, Disposition};
pub use bootstrap::{
    BootstrapError, Bootstrapped, ConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use bus::{Bus, BusError, Delivery, MemoryBus};
pub use client::{CallError, RemoteCaller};
pub use dispatch::{DispatchOutcome, Dispatched, Dispatcher};
pub use envelope::{Envelope, EnvelopeError, Params, RequestId};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use manager::{ServiceManager, ShutdownSignal, SystemShutdownSignal};
pub use registry::{
    Capabilities, Capability, Handler, HandlerFailure, HandlerRegistry, HandlerRegistryBuilder,
    HandlerResult, MessageContext, RemoteError, handler_fn,
};
pub use routing::{RoutingError, resolve};
pub use service::{Service, ServiceContext};
pub use switchyard_config::Config;

#[cfg(test)]
mod tests;
