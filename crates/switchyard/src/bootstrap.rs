//! Service bootstrap orchestration.

use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use switchyard_config::{Config, ConfigValidationError};
use thiserror::Error;

use crate::health::HealthReporter;
use crate::registry::HandlerRegistry;
use crate::service::ServiceContext;
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the service configuration.
    ///
    /// # Errors
    ///
    /// Returns the loader's error when no configuration can be assembled.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Configuration loaded but is unusable.
    #[error("invalid configuration: {source}")]
    Validation {
        /// The violated constraint.
        #[source]
        source: ConfigValidationError,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
}

/// Result of a successful bootstrap invocation.
pub struct Bootstrapped {
    config: Config,
    telemetry: TelemetryHandle,
    reporter: Arc<dyn HealthReporter>,
}

impl Bootstrapped {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub const fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// The reporter lifecycle events are sent to.
    #[must_use]
    pub fn reporter(&self) -> Arc<dyn HealthReporter> {
        Arc::clone(&self.reporter)
    }

    /// Builds the context workers share, using the configured poll interval.
    #[must_use]
    pub fn service_context(&self, registry: Arc<HandlerRegistry>) -> ServiceContext {
        ServiceContext::new(registry, self.reporter())
            .with_poll_interval(self.config.poll_interval())
    }
}

impl std::fmt::Debug for Bootstrapped {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Bootstrapped")
            .field("config", &self.config)
            .field("telemetry", &self.telemetry)
            .finish_non_exhaustive()
    }
}

/// Bootstraps a service using the supplied collaborators.
///
/// # Errors
///
/// Returns [`BootstrapError`] when the configuration cannot be loaded or
/// validated, or telemetry cannot be installed. The failure is reported to
/// `reporter` before it is returned.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
) -> Result<Bootstrapped, BootstrapError> {
    reporter.bootstrap_starting();

    let config = match loader.load() {
        Ok(config) => config,
        Err(source) => {
            return Err(fail(
                reporter.as_ref(),
                BootstrapError::Configuration { source },
            ));
        }
    };

    if let Err(source) = config.validate() {
        return Err(fail(reporter.as_ref(), BootstrapError::Validation { source }));
    }

    let telemetry = match telemetry::initialise(&config) {
        Ok(handle) => handle,
        Err(source) => {
            return Err(fail(reporter.as_ref(), BootstrapError::Telemetry { source }));
        }
    };

    reporter.bootstrap_succeeded(&config);
    Ok(Bootstrapped {
        config,
        telemetry,
        reporter,
    })
}

fn fail(reporter: &dyn HealthReporter, error: BootstrapError) -> BootstrapError {
    reporter.bootstrap_failed(&error);
    error
}
