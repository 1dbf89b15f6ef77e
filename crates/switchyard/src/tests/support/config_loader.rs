//! Test configuration loaders for scenarios covering success and failure
//! paths.

use std::ffi::OsString;
use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use switchyard_config::{Config, LogFormat};

use crate::bootstrap::ConfigLoader;

/// Loader returning a valid configuration declaring one queue.
pub struct TestConfigLoader {
    binding: String,
}

impl TestConfigLoader {
    pub fn with_queue(binding: impl Into<String>) -> Self {
        Self {
            binding: binding.into(),
        }
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(Config {
            queues: vec![self.binding.parse().expect("queue binding")],
            log_filter: "warn".to_owned(),
            log_format: LogFormat::Compact,
            ..Config::default()
        })
    }
}

/// Loader that loads successfully but declares no queues.
pub struct QueuelessConfigLoader;

impl ConfigLoader for QueuelessConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(Config::default())
    }
}

/// Loader that intentionally fails by passing an unsupported bus URI.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("switchyard"),
            OsString::from("--bus-uri"),
            OsString::from("kafka://broker:9092"),
        ];
        Config::load_from_iter(args)
    }
}
