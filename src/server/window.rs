//! Sliding window of per-second request completion counts.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

struct Bucket {
    /// Second tag the bucket currently counts for; 0 means never touched.
    second: AtomicU64,
    count: AtomicU64,
}

/// A ring of per-second counters covering the last `W` seconds.
///
/// Writers tag the bucket for the current second and zero it on the first
/// touch after the ring wraps; readers sum every bucket whose tag falls
/// inside the window. Updates are atomic and lock-free; a read racing a
/// wrap may be off by one bucket, which the accounting tolerates.
#[derive(Debug)]
pub struct RequestCountWindow {
    origin: Instant,
    buckets: Box<[Bucket]>,
}

impl std::fmt::Debug for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bucket")
            .field("second", &self.second.load(Ordering::Relaxed))
            .field("count", &self.count.load(Ordering::Relaxed))
            .finish()
    }
}

impl RequestCountWindow {
    /// Create a window `window_secs` wide. Widths below one second clamp
    /// to one.
    #[must_use]
    pub fn new(window_secs: usize) -> Self {
        let width = window_secs.max(1);
        let buckets = (0..width)
            .map(|_| Bucket {
                second: AtomicU64::new(0),
                count: AtomicU64::new(0),
            })
            .collect();
        Self {
            origin: Instant::now(),
            buckets,
        }
    }

    /// Window width in seconds.
    #[must_use]
    pub fn width_secs(&self) -> usize {
        self.buckets.len()
    }

    // Seconds are tagged starting at 1 so the zero tag means "empty".
    fn second_of(&self, now: Instant) -> u64 {
        now.saturating_duration_since(self.origin).as_secs() + 1
    }

    /// Count one completion at `now`.
    pub fn record(&self, now: Instant) {
        let sec = self.second_of(now);
        let bucket = &self.buckets[(sec as usize) % self.buckets.len()];

        let tagged = bucket.second.load(Ordering::Acquire);
        if tagged != sec {
            // First touch of this second: whoever wins the tag zeroes the
            // stale count; losers just add to the fresh bucket.
            if bucket
                .second
                .compare_exchange(tagged, sec, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                bucket.count.store(0, Ordering::Release);
            }
        }
        bucket.count.fetch_add(1, Ordering::AcqRel);
    }

    /// Total completions within the last `W` seconds as of `now`.
    #[must_use]
    pub fn count(&self, now: Instant) -> u64 {
        let sec = self.second_of(now);
        let width = self.buckets.len() as u64;
        self.buckets
            .iter()
            .map(|bucket| {
                let tagged = bucket.second.load(Ordering::Acquire);
                if tagged != 0 && tagged <= sec && sec - tagged < width {
                    bucket.count.load(Ordering::Acquire)
                } else {
                    0
                }
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_counts_within_window() {
        let window = RequestCountWindow::new(60);
        let t0 = Instant::now();

        window.record(t0);
        window.record(t0);
        window.record(t0 + Duration::from_secs(1));

        assert_eq!(window.count(t0 + Duration::from_secs(1)), 3);
    }

    #[test]
    fn test_old_buckets_age_out() {
        let window = RequestCountWindow::new(3);
        let t0 = Instant::now();

        window.record(t0);
        window.record(t0 + Duration::from_secs(1));

        // Still visible just inside the window.
        assert_eq!(window.count(t0 + Duration::from_secs(2)), 2);
        // The t0 bucket is now older than three seconds.
        assert_eq!(window.count(t0 + Duration::from_secs(3)), 1);
        // Everything aged out.
        assert_eq!(window.count(t0 + Duration::from_secs(10)), 0);
    }

    #[test]
    fn test_wrapped_bucket_is_zeroed() {
        let window = RequestCountWindow::new(2);
        let t0 = Instant::now();

        window.record(t0);
        window.record(t0);
        // Same ring slot, two window-widths later.
        let later = t0 + Duration::from_secs(4);
        window.record(later);

        assert_eq!(window.count(later), 1);
    }

    #[test]
    fn test_width_clamps_to_one() {
        let window = RequestCountWindow::new(0);
        assert_eq!(window.width_secs(), 1);
        let t0 = Instant::now();
        window.record(t0);
        assert_eq!(window.count(t0), 1);
    }

    #[test]
    fn test_concurrent_records() {
        use std::sync::Arc;
        let window = Arc::new(RequestCountWindow::new(60));
        let t0 = Instant::now();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let window = Arc::clone(&window);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        window.record(t0);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(window.count(t0), 8000);
    }
}
