//! Per-activation cancellation signal
//!
//! A fresh token is minted every time a mode starts, so a cancellation
//! left over from the previous activation can never be observed by the
//! next loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag bound to one mode activation
#[derive(Debug, Clone)]
pub struct CancelToken {
    generation: u64,
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Activation number this token belongs to
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Request the bound loop to stop at its next iteration boundary
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
