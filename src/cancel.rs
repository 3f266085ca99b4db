//! Cooperative cancellation for sampling and scheduling loops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag observed by the sampling loop at each query boundary and by
/// the scheduler's start-time wait loop.
///
/// Cancellation is cooperative: setting the flag does not tear anything down
/// by itself. The loops that observe it are responsible for closing the open
/// channel and returning the partial samples collected so far.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Safe to call from a signal handler thread.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear the flag so the token can be reused for the next menu action.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
