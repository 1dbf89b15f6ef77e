//! Test double for [`HealthReporter`] that records structured events for
//! assertions.

use std::sync::Mutex;

use switchyard_config::Config;

use crate::bootstrap::BootstrapError;
use crate::health::HealthReporter;
use crate::manager::WorkerExit;

/// Structured health events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    BootstrapStarting,
    BootstrapSucceeded,
    BootstrapFailed(String),
    ConsumeReady { worker: usize, queue: String },
    ConsumeEnded { worker: usize, queue: String },
    WorkerStarted(usize),
    WorkerExited { worker: usize, exit: WorkerExit },
}

/// Records health events for assertions.
#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    /// Counts recorded events matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&HealthEvent) -> bool) -> usize {
        self.events().iter().filter(|event| predicate(event)).count()
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn consume_ready(&self, worker: usize, queue: &str) {
        self.record(HealthEvent::ConsumeReady {
            worker,
            queue: queue.to_owned(),
        });
    }

    fn consume_ended(&self, worker: usize, queue: &str) {
        self.record(HealthEvent::ConsumeEnded {
            worker,
            queue: queue.to_owned(),
        });
    }

    fn worker_started(&self, worker: usize) {
        self.record(HealthEvent::WorkerStarted(worker));
    }

    fn worker_exited(&self, worker: usize, exit: &WorkerExit) {
        self.record(HealthEvent::WorkerExited {
            worker,
            exit: exit.clone(),
        });
    }
}
