//! A calculator service on the in-process bus.
//!
//! `add` sums two integers. `wordy_add` accepts number words, calls `add`
//! over the bus like any other client would, and answers in words. A
//! background client exercises both once the workers are up; the service then
//! runs until SIGINT or SIGTERM.
//!
//! ```text
//! cargo run --example simple_service -- --workers 2
//! ```

use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ortho_config::OrthoError;
use serde_json::{Value, json};
use switchyard::{
    CallError, Capabilities, Capability, Config, ConfigLoader, HandlerFailure, HandlerRegistry,
    HandlerResult, MemoryBus, MessageContext, Params, RemoteCaller, Service, ServiceManager,
    StructuredHealthReporter, SystemConfigLoader, SystemShutdownSignal, bootstrap_with, handler_fn,
};
use tracing::{error, info};

const QUEUE: &str = "simple";
const ROUTING_PREFIX: &str = "simple";
const CALL_TIMEOUT: Duration = Duration::from_secs(5);
/// `wordy_add` blocks its worker while `add` runs on another one.
const MIN_WORKERS: usize = 2;
const WORDS: [&str; 21] = [
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
    "eleven", "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen",
    "nineteen", "twenty",
];

/// Loads the system configuration, then applies [`with_demo_defaults`].
struct DemoConfigLoader;

impl ConfigLoader for DemoConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        SystemConfigLoader.load().map(with_demo_defaults)
    }
}

/// Binds `simple=simple.*` when no queue is configured and runs at least
/// [`MIN_WORKERS`] workers.
fn with_demo_defaults(mut config: Config) -> Config {
    if config.queues.is_empty() {
        config
            .queues
            .extend(format!("{QUEUE}={ROUTING_PREFIX}.*").parse().ok());
    }
    config.workers = config.workers.max(MIN_WORKERS);
    config
}

struct Calculator {
    bus: MemoryBus,
}

impl Capabilities for Calculator {
    fn capabilities(self) -> Vec<Capability> {
        let bus = self.bus;
        vec![
            Capability::new("on_add", add),
            Capability::new(
                "on_wordy_add",
                handler_fn(move |context, params| wordy_add(&bus, context, &params)),
            ),
        ]
    }
}

fn add(_: &MessageContext<'_>, params: Params) -> HandlerResult {
    let a: i64 = params.require(0, "a")?;
    let b: i64 = params.require(1, "b")?;
    a.checked_add(b)
        .map(Value::from)
        .ok_or_else(|| HandlerFailure::message("OverflowError", "sum does not fit in i64"))
}

fn to_number(word: &str) -> Result<i64, HandlerFailure> {
    WORDS
        .iter()
        .position(|known| *known == word)
        .and_then(|index| i64::try_from(index).ok())
        .ok_or_else(|| HandlerFailure::invalid_params(format!("unknown number word `{word}`")))
}

fn to_word(number: i64) -> Result<&'static str, HandlerFailure> {
    usize::try_from(number)
        .ok()
        .and_then(|index| WORDS.get(index).copied())
        .ok_or_else(|| HandlerFailure::message("ValueError", format!("no word for {number}")))
}

fn wordy_add(bus: &MemoryBus, context: &MessageContext<'_>, params: &Params) -> HandlerResult {
    let a = to_number(&params.require::<String>(0, "a")?)?;
    let b = to_number(&params.require::<String>(1, "b")?)?;
    info!(routing_key = context.routing_key, a, b, "delegating to add");
    let caller = RemoteCaller::on_memory_bus(bus, QUEUE).map_err(HandlerFailure::internal)?;
    let sum = caller
        .call(
            &format!("{ROUTING_PREFIX}.add"),
            "add",
            Params::from(vec![json!(a), json!(b)]),
            CALL_TIMEOUT,
        )
        .map_err(|error| match error {
            CallError::Remote(remote) => HandlerFailure::from(remote),
            other => HandlerFailure::internal(other),
        })?;
    let total = sum
        .as_i64()
        .ok_or_else(|| HandlerFailure::message("TypeError", "add returned a non-integer"))?;
    Ok(json!(to_word(total)?))
}

fn exercise(bus: &MemoryBus) -> Result<(), CallError> {
    let caller = RemoteCaller::on_memory_bus(bus, "demo-client")?;
    let sum = caller.call(
        &format!("{ROUTING_PREFIX}.add"),
        "add",
        Params::from(vec![json!(1), json!(2)]),
        CALL_TIMEOUT,
    )?;
    info!(%sum, "add answered");
    let words = caller.call(
        &format!("{ROUTING_PREFIX}.wordy_add"),
        "wordy_add",
        Params::from(vec![json!("seven"), json!("five")]),
        CALL_TIMEOUT,
    )?;
    info!(%words, "wordy_add answered");
    match caller.call(
        &format!("{ROUTING_PREFIX}.divide"),
        "divide",
        Params::default(),
        CALL_TIMEOUT,
    ) {
        Err(CallError::Remote(remote)) => info!(code = remote.code, %remote, "divide refused"),
        other => info!(?other, "divide answered unexpectedly"),
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let reporter = Arc::new(StructuredHealthReporter::new());
    let bootstrapped = bootstrap_with(&DemoConfigLoader, reporter)?;
    let bus = MemoryBus::from_config(bootstrapped.config())?;
    let registry = HandlerRegistry::from_capabilities(Calculator { bus: bus.clone() })?;
    let context = bootstrapped.service_context(Arc::new(registry));

    let factory_bus = bus.clone();
    let manager = ServiceManager::new(
        bootstrapped.config().workers(),
        bootstrapped.reporter(),
        move |index| Ok(Service::new(&context, index, QUEUE, factory_bus.consumer(QUEUE)?)),
    );

    thread::Builder::new()
        .name("demo-client".to_owned())
        .spawn(move || {
            if let Err(error) = exercise(&bus) {
                error!(%error, "demo client failed");
            }
        })?;

    manager.run(Arc::new(SystemShutdownSignal::new()))?;
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!(%error, "simple service failed");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::default(1, 2)]
    #[case::zero(0, 2)]
    #[case::larger(4, 4)]
    fn nested_calls_always_have_a_spare_worker(#[case] workers: usize, #[case] expected: usize) {
        let config = with_demo_defaults(Config {
            workers,
            ..Config::default()
        });
        assert_eq!(config.workers, expected);
    }

    #[test]
    fn binds_the_simple_queue_when_none_is_configured() {
        let config = with_demo_defaults(Config::default());
        assert_eq!(config.queues.len(), 1);
        assert_eq!(config.queues.first().map(|binding| binding.name()), Some(QUEUE));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn wordy_add_answers_through_a_second_worker() {
        let bus = MemoryBus::new("switchyard");
        bus.declare_queue(QUEUE, "simple.*").expect("declare");
        let registry =
            HandlerRegistry::from_capabilities(Calculator { bus: bus.clone() }).expect("registry");
        let context = switchyard::ServiceContext::new(
            Arc::new(registry),
            Arc::new(StructuredHealthReporter::new()),
        )
        .with_poll_interval(Duration::from_millis(10));
        let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let workers: Vec<_> = (0..MIN_WORKERS)
            .map(|index| {
                let service =
                    Service::new(&context, index, QUEUE, bus.consumer(QUEUE).expect("consumer"));
                let flag = Arc::clone(&stop);
                thread::spawn(move || service.run(&flag))
            })
            .collect();

        let caller = RemoteCaller::on_memory_bus(&bus, "test").expect("caller");
        let answer = caller
            .call(
                "simple.wordy_add",
                "wordy_add",
                Params::from(vec![json!("seven"), json!("five")]),
                CALL_TIMEOUT,
            )
            .expect("wordy_add");
        assert_eq!(answer, json!("twelve"));

        stop.store(true, std::sync::atomic::Ordering::Release);
        for worker in workers {
            worker.join().expect("worker thread");
        }
    }
}
