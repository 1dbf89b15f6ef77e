//! Behavioural coverage for configuration layering.

use std::cell::RefCell;
use std::ffi::OsString;
use std::fs;
use std::sync::{Mutex, MutexGuard, PoisonError};

use once_cell::sync::Lazy;
use ortho_config::OrthoConfig;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;

use crate::{Config, DEFAULT_BUS_EXCHANGE, QueueBinding, default_bus_uri};

/// Serialises scenarios that touch process-wide environment variables.
static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

const EXCHANGE_ENV: &str = "SWITCHYARD_BUS_EXCHANGE";

struct Harness {
    temp_dir: TempDir,
    cli_args: Vec<OsString>,
    file_lines: Vec<String>,
    env_overrides: Vec<(&'static str, Option<OsString>)>,
    outcome: Option<Result<Config, String>>,
    _env_guard: MutexGuard<'static, ()>,
}

impl Harness {
    fn new() -> Self {
        let env_guard = ENV_MUTEX.lock().unwrap_or_else(PoisonError::into_inner);
        Self {
            temp_dir: TempDir::new().expect("create temporary directory"),
            cli_args: vec![OsString::from("switchyard")],
            file_lines: Vec::new(),
            env_overrides: Vec::new(),
            outcome: None,
            _env_guard: env_guard,
        }
    }

    fn add_file_line(&mut self, line: String) {
        self.file_lines.push(line);
    }

    fn set_env(&mut self, key: &'static str, value: &str) {
        let previous = std::env::var_os(key);
        // Restored in `Drop`; ENV_MUTEX keeps other scenarios from observing it.
        unsafe { std::env::set_var(key, value) };
        self.env_overrides.push((key, previous));
    }

    fn push_cli_arg(&mut self, arg: impl Into<OsString>) {
        self.cli_args.push(arg.into());
    }

    fn load(&mut self) -> &Result<Config, String> {
        if self.outcome.is_none() {
            let mut args = vec![self.cli_args[0].clone()];
            if !self.file_lines.is_empty() {
                let path = self.temp_dir.path().join("switchyard.toml");
                fs::write(&path, self.file_lines.join("\n")).expect("write configuration");
                args.push(OsString::from("--config-path"));
                args.push(path.into_os_string());
            }
            args.extend(self.cli_args.iter().skip(1).cloned());
            self.outcome = Some(Config::load_from_iter(args).map_err(|error| error.to_string()));
        }
        self.outcome.as_ref().expect("outcome recorded")
    }

    fn loaded(&mut self) -> Config {
        match self.load() {
            Ok(config) => config.clone(),
            Err(error) => panic!("configuration failed to load: {error}"),
        }
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        while let Some((key, value)) = self.env_overrides.pop() {
            match value {
                Some(previous) => unsafe { std::env::set_var(key, previous) },
                None => unsafe { std::env::remove_var(key) },
            }
        }
    }
}

#[fixture]
fn harness() -> RefCell<Harness> {
    RefCell::new(Harness::new())
}

fn unquote(value: &str) -> &str {
    value.trim_matches('"')
}

#[given("a configuration file setting the bus exchange to \"{exchange}\"")]
fn given_file_exchange(harness: &RefCell<Harness>, exchange: String) {
    let exchange = unquote(&exchange).to_owned();
    harness
        .borrow_mut()
        .add_file_line(format!("bus_exchange = \"{exchange}\""));
}

#[given("a configuration file declaring the queue \"{binding}\"")]
fn given_file_queue(harness: &RefCell<Harness>, binding: String) {
    let binding = unquote(&binding).to_owned();
    harness
        .borrow_mut()
        .add_file_line(format!("queues = [\"{binding}\"]"));
}

#[given("the environment overrides the bus exchange to \"{exchange}\"")]
fn given_env_exchange(harness: &RefCell<Harness>, exchange: String) {
    harness
        .borrow_mut()
        .set_env(EXCHANGE_ENV, unquote(&exchange));
}

#[when("the CLI sets the bus exchange to \"{exchange}\"")]
fn when_cli_exchange(harness: &RefCell<Harness>, exchange: String) {
    let mut harness = harness.borrow_mut();
    harness.push_cli_arg("--bus-exchange");
    harness.push_cli_arg(unquote(&exchange));
}

#[when("the CLI sets the bus URI to \"{uri}\"")]
fn when_cli_bus_uri(harness: &RefCell<Harness>, uri: String) {
    let mut harness = harness.borrow_mut();
    harness.push_cli_arg("--bus-uri");
    harness.push_cli_arg(unquote(&uri));
}

#[when("the configuration loads without overrides")]
fn when_load_without_overrides(harness: &RefCell<Harness>) {
    let _ = harness.borrow_mut().load();
}

#[then("loading the configuration resolves the bus exchange to \"{exchange}\"")]
fn then_exchange(harness: &RefCell<Harness>, exchange: String) {
    let config = harness.borrow_mut().loaded();
    assert_eq!(config.bus_exchange(), unquote(&exchange));
}

#[then("the loaded queues include \"{binding}\"")]
fn then_queue(harness: &RefCell<Harness>, binding: String) {
    let config = harness.borrow_mut().loaded();
    let expected: QueueBinding = unquote(&binding).parse().expect("expected binding");
    assert!(
        config.queues().contains(&expected),
        "expected {expected} in {:?}",
        config.queues()
    );
}

#[then("loading the configuration applies the built-in defaults")]
fn then_defaults(harness: &RefCell<Harness>) {
    let config = harness.borrow_mut().loaded();
    assert_eq!(config.bus_exchange(), DEFAULT_BUS_EXCHANGE);
    assert_eq!(config.bus_uri(), &default_bus_uri());
    assert!(config.queues().is_empty());
}

#[then("loading the configuration fails")]
fn then_load_fails(harness: &RefCell<Harness>) {
    let mut harness = harness.borrow_mut();
    assert!(harness.load().is_err(), "expected configuration to be rejected");
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Built-in defaults apply when nothing is configured"
)]
fn defaults_apply(harness: RefCell<Harness>) {
    drop(harness);
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Configuration file values are loaded"
)]
fn file_values_load(harness: RefCell<Harness>) {
    drop(harness);
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Environment overrides the configuration file"
)]
fn environment_overrides_file(harness: RefCell<Harness>) {
    drop(harness);
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "CLI overrides the environment"
)]
fn cli_overrides_environment(harness: RefCell<Harness>) {
    drop(harness);
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Unsupported bus schemes are rejected"
)]
fn unsupported_scheme_rejected(harness: RefCell<Harness>) {
    drop(harness);
}
