//! Behavioural coverage for service bootstrap.

use std::cell::RefCell;
use std::sync::Arc;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use switchyard_config::LogFormat;

use super::support::{
    FailingConfigLoader, HealthEvent, QueuelessConfigLoader, RecordingHealthReporter,
    TestConfigLoader,
};
use crate::bootstrap::{BootstrapError, Bootstrapped, ConfigLoader, bootstrap_with};
use crate::bus::{MemoryBus, PublishProperties};

struct BootstrapWorld {
    loader: Option<Box<dyn ConfigLoader>>,
    reporter: Arc<RecordingHealthReporter>,
    outcome: Option<Result<Bootstrapped, BootstrapError>>,
}

impl BootstrapWorld {
    fn new() -> Self {
        Self {
            loader: None,
            reporter: Arc::new(RecordingHealthReporter::default()),
            outcome: None,
        }
    }

    fn bootstrapped(&self) -> &Bootstrapped {
        match self.outcome.as_ref().expect("bootstrap ran") {
            Ok(bootstrapped) => bootstrapped,
            Err(error) => panic!("bootstrap failed: {error}"),
        }
    }

    fn failure(&self) -> &BootstrapError {
        match self.outcome.as_ref().expect("bootstrap ran") {
            Ok(_) => panic!("bootstrap unexpectedly succeeded"),
            Err(error) => error,
        }
    }
}

#[fixture]
fn world() -> RefCell<BootstrapWorld> {
    RefCell::new(BootstrapWorld::new())
}

fn unquote(value: &str) -> &str {
    value.trim_matches('"')
}

#[given("a configuration loader declaring the queue \"{binding}\"")]
fn given_valid_loader(world: &RefCell<BootstrapWorld>, binding: String) {
    world.borrow_mut().loader = Some(Box::new(TestConfigLoader::with_queue(unquote(&binding))));
}

#[given("a configuration loader naming an unsupported bus")]
fn given_failing_loader(world: &RefCell<BootstrapWorld>) {
    world.borrow_mut().loader = Some(Box::new(FailingConfigLoader));
}

#[given("a configuration loader declaring no queues")]
fn given_queueless_loader(world: &RefCell<BootstrapWorld>) {
    world.borrow_mut().loader = Some(Box::new(QueuelessConfigLoader));
}

#[when("the service bootstrap runs")]
fn when_bootstrap(world: &RefCell<BootstrapWorld>) {
    let mut world = world.borrow_mut();
    let loader = world.loader.take().expect("loader configured");
    let reporter = Arc::clone(&world.reporter);
    world.outcome = Some(bootstrap_with(loader.as_ref(), reporter));
}

#[then("bootstrap succeeds")]
fn then_succeeds(world: &RefCell<BootstrapWorld>) {
    let world = world.borrow();
    let bootstrapped = world.bootstrapped();
    assert_eq!(bootstrapped.config().queues().len(), 1);
    assert_eq!(bootstrapped.telemetry().format(), LogFormat::Compact);
}

#[then("bootstrap fails to load the configuration")]
fn then_load_fails(world: &RefCell<BootstrapWorld>) {
    let world = world.borrow();
    assert!(matches!(
        world.failure(),
        BootstrapError::Configuration { .. }
    ));
}

#[then("bootstrap rejects the configuration")]
fn then_validation_fails(world: &RefCell<BootstrapWorld>) {
    let world = world.borrow();
    assert!(matches!(world.failure(), BootstrapError::Validation { .. }));
}

#[then("the reporter recorded bootstrap start then success")]
fn then_reported_success(world: &RefCell<BootstrapWorld>) {
    assert_eq!(
        world.borrow().reporter.events(),
        vec![HealthEvent::BootstrapStarting, HealthEvent::BootstrapSucceeded]
    );
}

#[then("the reporter recorded bootstrap start then failure")]
fn then_reported_failure(world: &RefCell<BootstrapWorld>) {
    let world = world.borrow();
    let events = world.reporter.events();
    let expected = world.failure().to_string();
    assert_eq!(
        events,
        vec![
            HealthEvent::BootstrapStarting,
            HealthEvent::BootstrapFailed(expected),
        ]
    );
}

#[then("messages for \"{key}\" reach the \"{queue}\" queue")]
fn then_queue_bound(world: &RefCell<BootstrapWorld>, key: String, queue: String) {
    let world = world.borrow();
    let bus = MemoryBus::from_config(world.bootstrapped().config()).expect("in-memory bus");
    bus.publish_topic(unquote(&key), b"{}", &PublishProperties::default())
        .expect("publish");
    assert_eq!(bus.queue_depth(unquote(&queue)).expect("queue depth"), 1);
}

#[scenario(
    path = "tests/features/service_bootstrap.feature",
    name = "Bootstrap succeeds with a valid configuration"
)]
fn bootstrap_succeeds(world: RefCell<BootstrapWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/service_bootstrap.feature",
    name = "Bootstrap fails when the configuration cannot be loaded"
)]
fn bootstrap_load_fails(world: RefCell<BootstrapWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/service_bootstrap.feature",
    name = "Bootstrap fails when no queue is declared"
)]
fn bootstrap_rejects_queueless_config(world: RefCell<BootstrapWorld>) {
    drop(world);
}
