//! Non-blocking leaky bucket.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// A leaky bucket: each admission fills one slot, one slot drains per
/// `interval`, and a full bucket rejects.
///
/// Like the token bucket, drain is settled lazily on the way into an
/// admission check, so there is no background drainer and the check never
/// blocks.
#[derive(Debug)]
pub struct LeakyBucket {
    capacity: u64,
    interval: Duration,
    origin: Instant,
    level: AtomicU64,
    /// Whole drain intervals elapsed at the last settled drain.
    drained_ticks: AtomicU64,
}

impl LeakyBucket {
    /// Create a bucket of `capacity` slots draining one per `interval`.
    #[must_use]
    pub fn new(capacity: u64, interval: Duration) -> Self {
        Self {
            capacity,
            interval: if interval.is_zero() {
                Duration::from_millis(1)
            } else {
                interval
            },
            origin: Instant::now(),
            level: AtomicU64::new(0),
            drained_ticks: AtomicU64::new(0),
        }
    }

    /// Queue capacity.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Occupied slots at `now`.
    #[must_use]
    pub fn level_at(&self, now: Instant) -> u64 {
        self.drain_at(now);
        self.level.load(Ordering::Acquire)
    }

    /// Fill one slot if the bucket is not full. Non-blocking.
    pub fn try_admit(&self) -> bool {
        self.try_admit_at(Instant::now())
    }

    /// Fill one slot as of `now`. Non-blocking.
    pub fn try_admit_at(&self, now: Instant) -> bool {
        self.drain_at(now);

        let mut current = self.level.load(Ordering::Acquire);
        loop {
            if current >= self.capacity {
                return false;
            }
            match self.level.compare_exchange_weak(
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

    fn drain_at(&self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.origin);
        let ticks = (elapsed.as_nanos() / self.interval.as_nanos()) as u64;

        let settled = self.drained_ticks.load(Ordering::Acquire);
        if ticks <= settled {
            return;
        }
        if self
            .drained_ticks
            .compare_exchange(settled, ticks, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let drain = ticks - settled;
        let mut current = self.level.load(Ordering::Acquire);
        loop {
            let next = current.saturating_sub(drain);
            if next == current {
                return;
            }
            match self.level.compare_exchange_weak(
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
