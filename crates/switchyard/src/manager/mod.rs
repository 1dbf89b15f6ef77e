//! Supervision of a fixed pool of workers.
//!
//! The manager keeps `workers` threads alive. A worker whose thread ends,
//! whether it returned or panicked, is joined, reported, and replaced by a
//! fresh one from the factory. When the shutdown signal fires every worker
//! is told to stop and joined before [`ServiceManager::run`] returns.

mod shutdown;

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::bus::{Bus, BusError};
use crate::dispatch::panic_message;
use crate::health::HealthReporter;
use crate::service::Service;

pub use self::shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};

/// Tracing target for supervision.
pub(crate) const MANAGER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::manager");

/// How often worker threads are checked.
pub const DEFAULT_SUPERVISE_INTERVAL: Duration = Duration::from_millis(100);

/// Something a worker thread runs until told to stop.
pub trait Worker: Send + 'static {
    /// Runs until `shutdown` is set.
    fn run(&self, shutdown: &AtomicBool);
}

impl<B> Worker for Service<B>
where
    B: Bus + 'static,
{
    fn run(&self, shutdown: &AtomicBool) {
        Self::run(self, shutdown);
    }
}

/// How a worker thread ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    /// The worker returned.
    Returned,
    /// The worker thread panicked.
    Panicked {
        /// The panic message.
        message: String,
    },
}

impl fmt::Display for WorkerExit {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Returned => formatter.write_str("returned"),
            Self::Panicked { message } => write!(formatter, "panicked: {message}"),
        }
    }
}

/// Errors that end supervision.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// The manager was asked to run zero workers.
    #[error("at least one worker is required")]
    NoWorkers,
    /// The shutdown listener thread could not be started.
    #[error("failed to spawn shutdown listener: {source}")]
    Spawn {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The shutdown listener failed.
    #[error("shutdown listener failed: {source}")]
    Shutdown {
        /// Underlying listener error.
        #[source]
        source: ShutdownError,
    },
}

type WorkerFactory = dyn Fn(usize) -> Result<Box<dyn Worker>, BusError> + Send + Sync;

/// Keeps a pool of workers running until shutdown.
pub struct ServiceManager {
    workers: usize,
    factory: Arc<WorkerFactory>,
    reporter: Arc<dyn HealthReporter>,
    supervise_interval: Duration,
}

impl ServiceManager {
    /// Creates a manager running `workers` workers built by `factory`, which
    /// receives the worker index.
    pub fn new<F, W>(workers: usize, reporter: Arc<dyn HealthReporter>, factory: F) -> Self
    where
        F: Fn(usize) -> Result<W, BusError> + Send + Sync + 'static,
        W: Worker,
    {
        Self {
            workers,
            factory: Arc::new(move |index| {
                factory(index).map(|worker| Box::new(worker) as Box<dyn Worker>)
            }),
            reporter,
            supervise_interval: DEFAULT_SUPERVISE_INTERVAL,
        }
    }

    /// Replaces how often worker threads are checked.
    #[must_use]
    pub const fn with_supervise_interval(mut self, interval: Duration) -> Self {
        self.supervise_interval = interval;
        self
    }

    /// Number of workers kept alive.
    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Supervises the workers until `signal` fires.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError`] when no workers were requested or the
    /// shutdown listener fails. Workers are stopped and joined either way.
    pub fn run(&self, signal: Arc<dyn ShutdownSignal>) -> Result<(), ManagerError> {
        if self.workers == 0 {
            return Err(ManagerError::NoWorkers);
        }

        let (sender, receiver) = mpsc::channel();
        thread::Builder::new()
            .name("switchyard-shutdown".to_owned())
            .spawn(move || {
                if sender.send(signal.wait()).is_err() {
                    debug!(target: MANAGER_TARGET, "manager finished before shutdown signal");
                }
            })
            .map_err(|source| ManagerError::Spawn { source })?;

        let stop = Arc::new(AtomicBool::new(false));
        let mut slots: Vec<Option<JoinHandle<()>>> =
            (0..self.workers).map(|index| self.spawn(index, &stop)).collect();
        info!(target: MANAGER_TARGET, workers = self.workers, "service manager running");

        let result = loop {
            match receiver.try_recv() {
                Ok(Ok(())) | Err(TryRecvError::Disconnected) => break Ok(()),
                Ok(Err(source)) => break Err(ManagerError::Shutdown { source }),
                Err(TryRecvError::Empty) => {}
            }
            self.replace_finished(&mut slots, &stop);
            thread::sleep(self.supervise_interval);
        };

        stop.store(true, Ordering::Release);
        for (index, slot) in slots.into_iter().enumerate() {
            if let Some(handle) = slot {
                self.reporter.worker_exited(index, &join_worker(handle));
            }
        }
        info!(target: MANAGER_TARGET, "service manager stopped");
        result
    }

    fn replace_finished(&self, slots: &mut [Option<JoinHandle<()>>], stop: &Arc<AtomicBool>) {
        for (index, slot) in slots.iter_mut().enumerate() {
            if !slot.as_ref().is_none_or(JoinHandle::is_finished) {
                continue;
            }
            if let Some(handle) = slot.take() {
                let exit = join_worker(handle);
                warn!(
                    target: MANAGER_TARGET,
                    worker = index,
                    exit = %exit,
                    "worker finished; replacing it with a new one"
                );
                self.reporter.worker_exited(index, &exit);
            }
            *slot = self.spawn(index, stop);
        }
    }

    fn spawn(&self, index: usize, stop: &Arc<AtomicBool>) -> Option<JoinHandle<()>> {
        let worker = match (self.factory)(index) {
            Ok(worker) => worker,
            Err(error) => {
                error!(target: MANAGER_TARGET, worker = index, %error, "failed to build worker");
                return None;
            }
        };
        let flag = Arc::clone(stop);
        match thread::Builder::new()
            .name(format!("switchyard-worker-{index}"))
            .spawn(move || worker.run(&flag))
        {
            Ok(handle) => {
                self.reporter.worker_started(index);
                Some(handle)
            }
            Err(error) => {
                error!(target: MANAGER_TARGET, worker = index, %error, "failed to spawn worker");
                None
            }
        }
    }
}

impl fmt::Debug for ServiceManager {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ServiceManager")
            .field("workers", &self.workers)
            .field("supervise_interval", &self.supervise_interval)
            .finish_non_exhaustive()
    }
}

fn join_worker(handle: JoinHandle<()>) -> WorkerExit {
    match handle.join() {
        Ok(()) => WorkerExit::Returned,
        Err(payload) => WorkerExit::Panicked {
            message: panic_message(payload.as_ref()),
        },
    }
}
