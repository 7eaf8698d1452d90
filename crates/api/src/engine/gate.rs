//! Concurrency gate bounding how many jobs run at once.
//!
//! The gate is a pair of atomic counters. Reservation is a single
//! compare-and-swap so two callers racing for the last slot can never both
//! win. Lowering the limit never preempts running jobs; it only delays
//! further admissions until enough of them finish.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counting gate with an adjustable ceiling.
#[derive(Debug)]
pub struct ConcurrencyGate {
    limit: AtomicUsize,
    running: AtomicUsize,
}

impl ConcurrencyGate {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: AtomicUsize::new(limit),
            running: AtomicUsize::new(0),
        }
    }

    /// Change the ceiling. Takes effect on the next reservation.
    pub fn set_limit(&self, limit: usize) {
        let previous = self.limit.swap(limit, Ordering::SeqCst);
        if previous != limit {
            tracing::info!(previous, limit, "Concurrency limit changed");
        }
    }

    pub fn limit(&self) -> usize {
        self.limit.load(Ordering::SeqCst)
    }

    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// `limit - running`, saturating at zero.
    pub fn available_slots(&self) -> usize {
        self.limit().saturating_sub(self.running())
    }

    /// Take one slot if `running < limit`.
    pub fn try_reserve(&self) -> bool {
        self.running
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |running| {
                (running < self.limit.load(Ordering::SeqCst)).then_some(running + 1)
            })
            .is_ok()
    }

    /// Give one slot back.
    pub fn release(&self) {
        let released = self
            .running
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |running| {
                running.checked_sub(1)
            });
        if released.is_err() {
            tracing::warn!("Concurrency gate released with no running jobs");
        }
    }

    /// Reserve a slot wrapped in a permit that releases it on drop.
    pub fn try_acquire(self: &Arc<Self>) -> Option<GatePermit> {
        self.try_reserve().then(|| GatePermit {
            gate: Arc::clone(self),
        })
    }
}

/// One reserved slot. Released exactly once, when dropped.
#[derive(Debug)]
pub struct GatePermit {
    gate: Arc<ConcurrencyGate>,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        self.gate.release();
    }
}
