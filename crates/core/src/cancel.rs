//! Cooperative abort signal for long-running aggregations.
//!
//! Aggregations are pure reads, so aborting one mid-way leaves no state
//! behind; the caller simply receives an `Aborted` error.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared flag checked by aggregation loops.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    flag: Arc<AtomicBool>,
}

impl AbortSignal {
    /// Creates a signal that has not been raised.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the signal. Every clone observes it.
    pub fn abort(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Returns true once the signal has been raised.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
