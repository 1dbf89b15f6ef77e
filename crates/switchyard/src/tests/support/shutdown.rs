//! Shutdown signal the tests trigger by hand.

use std::io;
use std::sync::{Arc, Condvar, Mutex};

use crate::manager::{ShutdownError, ShutdownSignal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Pending,
    Shutdown,
    Fail,
}

/// Signal released by [`TestShutdownSignal::trigger`].
#[derive(Clone)]
pub struct TestShutdownSignal {
    inner: Arc<(Mutex<Trigger>, Condvar)>,
}

impl TestShutdownSignal {
    pub fn new() -> Self {
        Self {
            inner: Arc::new((Mutex::new(Trigger::Pending), Condvar::new())),
        }
    }

    /// Releases waiters with a clean shutdown.
    pub fn trigger(&self) {
        self.set(Trigger::Shutdown);
    }

    /// Releases waiters with a listener failure.
    pub fn fail(&self) {
        self.set(Trigger::Fail);
    }

    fn set(&self, value: Trigger) {
        let (lock, cvar) = &*self.inner;
        let mut state = lock.lock().expect("shutdown mutex poisoned");
        *state = value;
        cvar.notify_all();
    }
}

impl ShutdownSignal for TestShutdownSignal {
    fn wait(&self) -> Result<(), ShutdownError> {
        let (lock, cvar) = &*self.inner;
        let mut state = lock.lock().expect("shutdown mutex poisoned");
        while *state == Trigger::Pending {
            state = cvar
                .wait(state)
                .expect("shutdown mutex poisoned during wait");
        }
        match *state {
            Trigger::Fail => Err(ShutdownError::Install {
                source: io::Error::other("signal handlers unavailable"),
            }),
            Trigger::Pending | Trigger::Shutdown => Ok(()),
        }
    }
}
