//! Tests for configuration defaults, validation, and layering.

mod behaviour;

use rstest::rstest;

use crate::{
    Config, ConfigValidationError, DEFAULT_BUS_EXCHANGE, LogFormat, QueueBinding, default_bus_uri,
};

fn valid_config() -> Config {
    Config {
        queues: vec![QueueBinding::new("simple", "simple.*").expect("binding")],
        ..Config::default()
    }
}

#[test]
fn defaults_describe_in_memory_bus() {
    let config = Config::default();
    assert_eq!(config.bus_uri(), &default_bus_uri());
    assert_eq!(config.bus_exchange(), DEFAULT_BUS_EXCHANGE);
    assert_eq!(config.workers(), 1);
    assert_eq!(config.log_format(), LogFormat::Json);
    assert!(config.queues().is_empty());
}

#[test]
fn valid_config_passes_validation() {
    assert_eq!(valid_config().validate(), Ok(()));
}

#[rstest]
#[case::blank_exchange(Config { bus_exchange: "  ".into(), ..valid_config() }, ConfigValidationError::EmptyExchange)]
#[case::no_workers(Config { workers: 0, ..valid_config() }, ConfigValidationError::NoWorkers)]
#[case::zero_poll(Config { poll_interval_ms: 0, ..valid_config() }, ConfigValidationError::ZeroPollInterval)]
#[case::no_queues(Config { queues: Vec::new(), ..valid_config() }, ConfigValidationError::NoQueues)]
fn validation_rejects(#[case] config: Config, #[case] expected: ConfigValidationError) {
    assert_eq!(config.validate(), Err(expected));
}
