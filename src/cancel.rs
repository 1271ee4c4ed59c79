//! Cooperative cancellation flag shared between a worker and its callers.
//!
//! Cancellation is polled at well-defined checkpoints (between page captures,
//! around gate submissions, before assembly and save). It never pre-empts an
//! atomic step: a page capture or file write in flight completes or fails as a
//! unit before the flag is observed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable cancel bit. Setting it is idempotent and visible to all clones.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Takes effect at the next checkpoint.
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
