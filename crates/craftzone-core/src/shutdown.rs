//! Shared stop flag for the pass scheduler.
//!
//! A [`ShutdownSignal`] is cloned into whatever task watches for unload
//! (ctrl-c, max ticks, host teardown) and into the [`PassScheduler`]. The
//! scheduler polls it at the start of every tick, so once it is raised no
//! further slice runs.
//!
//! [`PassScheduler`]: crate::scheduler::PassScheduler

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cloneable, lock-free stop request.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    requested: Arc<AtomicBool>,
}

impl ShutdownSignal {
    /// A signal that has not been raised.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal. Every clone observes it.
    pub fn request(&self) {
        self.requested.store(true, Ordering::Release);
    }

    /// Whether the signal has been raised.
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}
