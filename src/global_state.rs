use atomic_refcell::AtomicRefCell;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Global states of one TierMem instance. Components that need them hold a
/// reference to this struct instead of reaching back into the instance.
pub struct GlobalState {
    /// Set once the worker threads have been spawned.
    pub(crate) initialized: AtomicBool,
    /// The cooperative shutdown flag. Workers drain their queues and exit
    /// once it is raised.
    pub(crate) shutdown: AtomicBool,
    /// When did the run start? Written once, at initialization.
    pub(crate) run_start: AtomicRefCell<Option<Instant>>,
}

impl GlobalState {
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Seconds since initialization, if the instance was initialized.
    pub fn uptime_secs(&self) -> Option<f64> {
        (*self.run_start.borrow()).map(|start| start.elapsed().as_secs_f64())
    }
}

impl Default for GlobalState {
    fn default() -> Self {
        Self {
            initialized: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            run_start: AtomicRefCell::new(None),
        }
    }
}
