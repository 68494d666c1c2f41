//! Counting semaphore bounding in-flight bulk flushes.
//!
//! Uses `Mutex + Condvar` from std. Permits are owned so they can move into
//! flush worker threads.

use std::sync::{Arc, Condvar, Mutex, PoisonError};

/// A counting semaphore that limits concurrent flushes.
pub struct Semaphore {
    permits: usize,
    available: Mutex<usize>,
    cond: Condvar,
}

/// RAII permit that releases itself on drop (including on unwind).
pub struct Permit(Arc<Semaphore>);

impl Semaphore {
    /// Create a semaphore with `permits` initial permits.
    pub fn new(permits: usize) -> Arc<Self> {
        Arc::new(Self {
            permits,
            available: Mutex::new(permits),
            cond: Condvar::new(),
        })
    }

    /// Block until a permit is available, then acquire it.
    pub fn acquire(self: &Arc<Self>) -> Permit {
        let mut count = self
            .available
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while *count == 0 {
            count = self
                .cond
                .wait(count)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *count -= 1;
        Permit(Arc::clone(self))
    }

    /// Block until every permit has been returned.
    pub fn wait_idle(&self) {
        let mut count = self
            .available
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while *count < self.permits {
            count = self
                .cond
                .wait(count)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Permits currently held.
    pub fn in_use(&self) -> usize {
        let count = self
            .available
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.permits - *count
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        let mut count = self
            .0
            .available
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *count += 1;
        self.0.cond.notify_all();
    }
}
