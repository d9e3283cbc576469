//! Global in-flight request cap.

use std::sync::atomic::{AtomicI64, Ordering};

/// Caps the number of concurrently admitted requests.
///
/// A non-positive cap admits nothing; that degenerate configuration still
/// behaves predictably rather than wrapping.
#[derive(Debug)]
pub struct ConcurrencyLimiter {
    cap: i64,
    in_flight: AtomicI64,
}

impl ConcurrencyLimiter {
    /// Create a limiter admitting up to `cap` concurrent requests.
    #[must_use]
    pub fn new(cap: i64) -> Self {
        Self {
            cap,
            in_flight: AtomicI64::new(0),
        }
    }

    /// The configured cap.
    #[must_use]
    pub fn cap(&self) -> i64 {
        self.cap
    }

    /// Currently held slots.
    #[must_use]
    pub fn in_flight(&self) -> i64 {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Take a slot if one is free.
    pub fn try_acquire(&self) -> bool {
        let mut current = self.in_flight.load(Ordering::Acquire);
        loop {
            if current >= self.cap {
                return false;
            }
            match self.in_flight.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }

    /// Hand a slot back.
    pub fn release(&self) {
        let mut current = self.in_flight.load(Ordering::Acquire);
        loop {
            let next = (current - 1).max(0);
            match self.in_flight.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }
}
