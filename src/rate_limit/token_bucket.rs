//! Non-blocking token bucket.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// A token bucket that starts full and refills `fill_count` tokens per
/// `fill_interval`, capped at `capacity`.
///
/// Refill is lazy: callers settle elapsed whole intervals with atomic
/// compare-exchange arithmetic on the way into an acquire, so there is no
/// background refiller and acquisition never blocks.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: u64,
    fill_count: u64,
    fill_interval: Duration,
    origin: Instant,
    tokens: AtomicU64,
    /// Whole fill intervals elapsed at the last settled refill.
    filled_ticks: AtomicU64,
}

impl TokenBucket {
    /// Create a bucket with the given capacity and refill schedule.
    #[must_use]
    pub fn new(capacity: u64, fill_count: u64, fill_interval: Duration) -> Self {
        Self {
            capacity,
            fill_count,
            fill_interval: if fill_interval.is_zero() {
                Duration::from_millis(1)
            } else {
                fill_interval
            },
            origin: Instant::now(),
            tokens: AtomicU64::new(capacity),
            filled_ticks: AtomicU64::new(0),
        }
    }

    /// Burst capacity.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Tokens available at `now`.
    #[must_use]
    pub fn available_at(&self, now: Instant) -> u64 {
        self.refill_at(now);
        self.tokens.load(Ordering::Acquire)
    }

    /// Take one token, settling any elapsed refill first. Non-blocking.
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    /// Take one token as of `now`. Non-blocking.
    pub fn try_acquire_at(&self, now: Instant) -> bool {
        self.refill_at(now);

        let mut current = self.tokens.load(Ordering::Acquire);
        loop {
            if current == 0 {
                return false;
            }
            match self.tokens.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }

    fn refill_at(&self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.origin);
        let ticks = (elapsed.as_nanos() / self.fill_interval.as_nanos()) as u64;

        let settled = self.filled_ticks.load(Ordering::Acquire);
        if ticks <= settled {
            return;
        }
        // Whoever advances the tick counter owns adding the tokens.
        if self
            .filled_ticks
            .compare_exchange(settled, ticks, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let add = (ticks - settled).saturating_mul(self.fill_count);
        let mut current = self.tokens.load(Ordering::Acquire);
        loop {
            let next = current.saturating_add(add).min(self.capacity);
            if next == current {
                return;
            }
            match self.tokens.compare_exchange_weak(
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_full_and_drains() {
        let bucket = TokenBucket::new(2, 1, Duration::from_secs(1));
        let t0 = Instant::now();

        assert!(bucket.try_acquire_at(t0));
        assert!(bucket.try_acquire_at(t0));
        assert!(!bucket.try_acquire_at(t0));
    }

    #[test]
    fn test_refills_per_interval() {
        let bucket = TokenBucket::new(2, 1, Duration::from_secs(1));
        let t0 = Instant::now();

        assert!(bucket.try_acquire_at(t0));
        assert!(bucket.try_acquire_at(t0));
        assert!(!bucket.try_acquire_at(t0));

        // One fill interval later a single token is back.
        let t1 = t0 + Duration::from_secs(1);
        assert!(bucket.try_acquire_at(t1));
        assert!(!bucket.try_acquire_at(t1));
    }

    #[test]
    fn test_refill_caps_at_capacity() {
        let bucket = TokenBucket::new(5, 10, Duration::from_millis(100));
        let t0 = Instant::now();

        let much_later = t0 + Duration::from_secs(60);
        assert_eq!(bucket.available_at(much_later), 5);
    }

    #[test]
    fn test_partial_interval_adds_nothing() {
        let bucket = TokenBucket::new(1, 1, Duration::from_secs(1));
        let t0 = Instant::now();

        assert!(bucket.try_acquire_at(t0));
        assert!(!bucket.try_acquire_at(t0 + Duration::from_millis(999)));
        assert!(bucket.try_acquire_at(t0 + Duration::from_secs(1)));
    }

    #[test]
    fn test_multiple_elapsed_intervals_accumulate() {
        let bucket = TokenBucket::new(10, 2, Duration::from_millis(100));
        let t0 = Instant::now();

        for _ in 0..10 {
            assert!(bucket.try_acquire_at(t0));
        }
        assert_eq!(bucket.available_at(t0), 0);

        // Three intervals pass: six tokens back.
        assert_eq!(bucket.available_at(t0 + Duration::from_millis(300)), 6);
    }

    #[test]
    fn test_concurrent_drain_never_over_admits() {
        use std::sync::Arc;

        let bucket = Arc::new(TokenBucket::new(100, 0, Duration::from_secs(3600)));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let bucket = Arc::clone(&bucket);
                std::thread::spawn(move || {
                    let mut admitted = 0u64;
                    for _ in 0..100 {
                        if bucket.try_acquire() {
                            admitted += 1;
                        }
                    }
                    admitted
                })
            })
            .collect();

        let total: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 100);
    }
}
