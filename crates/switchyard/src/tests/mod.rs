//! Test suites for the Switchyard service runtime.

mod bootstrap_behaviour;
mod support;
