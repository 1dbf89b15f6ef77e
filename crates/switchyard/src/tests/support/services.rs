//! Handlers and helpers shared by the service-level suites.

use std::io;
use std::thread;
use std::time::{Duration, Instant};

use serde_json::json;

use crate::envelope::Params;
use crate::registry::{
    HandlerFailure, HandlerRegistry, HandlerRegistryBuilder, HandlerResult, MessageContext,
    RemoteError,
};

/// Queue the calculator service consumes.
pub const CALC_QUEUE: &str = "calc";
/// Queue callers expect replies on.
pub const REPLY_QUEUE: &str = "replies";

fn add(_: &MessageContext<'_>, params: Params) -> HandlerResult {
    let a: i64 = params.require(0, "a")?;
    let b: i64 = params.require(1, "b")?;
    Ok(json!(a + b))
}

fn ping(_: &MessageContext<'_>, _: Params) -> HandlerResult {
    Err(HandlerFailure::internal(io::Error::other("ping handler failed")))
}

fn charge(_: &MessageContext<'_>, _: Params) -> HandlerResult {
    Err(RemoteError::new(-32000, "quota exceeded").into())
}

fn explode(_: &MessageContext<'_>, _: Params) -> HandlerResult {
    panic!("explode handler panicked");
}

/// Registry binding `add`, `ping` (always fails), `charge` (declared error)
/// and `explode` (panics).
pub fn calculator_registry() -> HandlerRegistry {
    HandlerRegistryBuilder::new()
        .on("add", add)
        .on("ping", ping)
        .on("charge", charge)
        .on("explode", explode)
        .build()
        .expect("calculator registry")
}

/// Polls `condition` until it holds or `timeout` elapses.
pub fn wait_for(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}
