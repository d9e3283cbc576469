//! # Admission control
//!
//! Up to three independently enabled limiters gate every dispatch, checked
//! in a fixed order: the global concurrency cap, then the token bucket,
//! then the leaky bucket. A request rejected by one limiter never reaches
//! the next, and anything already acquired is handed back before the
//! rejection is returned.
//!
//! Admission is strictly non-blocking: a limiter either grants immediately
//! or the request fails with the corresponding [`ThrottleKind`]. Token
//! refill and leaky drain happen lazily with atomic arithmetic quantized to
//! whole intervals, so no background timer is needed and no path ever
//! waits.

pub mod concurrency;
pub mod leaky_bucket;
pub mod token_bucket;

pub use concurrency::ConcurrencyLimiter;
pub use leaky_bucket::LeakyBucket;
pub use token_bucket::TokenBucket;

use crate::config::{keys, ClientConfig};
use crate::error::ThrottleKind;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Admission tuning, resolved once from configuration.
#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    /// Enable the global concurrency limiter.
    pub concurrency_enabled: bool,
    /// Global in-flight cap when the concurrency limiter is enabled.
    pub max_total_connections: i64,
    /// Enable the token bucket limiter.
    pub token_bucket_enabled: bool,
    /// Token bucket capacity.
    pub token_bucket_capacity: u64,
    /// Tokens added per fill interval.
    pub token_bucket_fill_count: u64,
    /// Token bucket fill interval.
    pub token_bucket_fill_interval: Duration,
    /// Enable the leaky bucket limiter.
    pub leaky_bucket_enabled: bool,
    /// Leaky bucket capacity.
    pub leaky_bucket_capacity: u64,
    /// One slot drains per interval.
    pub leaky_bucket_interval: Duration,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            concurrency_enabled: keys::DEFAULT_CONCURRENCY_RATE_LIMIT_SWITCH,
            max_total_connections: keys::DEFAULT_MAX_TOTAL_CONNECTIONS,
            token_bucket_enabled: keys::DEFAULT_TOKEN_BUCKET_RATE_LIMIT_SWITCH,
            token_bucket_capacity: keys::DEFAULT_TOKEN_BUCKET_CAPACITY as u64,
            token_bucket_fill_count: keys::DEFAULT_TOKEN_BUCKET_FILL_COUNT as u64,
            token_bucket_fill_interval: keys::DEFAULT_TOKEN_BUCKET_FILL_INTERVAL,
            leaky_bucket_enabled: keys::DEFAULT_LEAKY_BUCKET_RATE_LIMIT_SWITCH,
            leaky_bucket_capacity: keys::DEFAULT_LEAKY_BUCKET_CAPACITY as u64,
            leaky_bucket_interval: keys::DEFAULT_LEAKY_BUCKET_INTERVAL,
        }
    }
}

impl AdmissionConfig {
    /// Resolve from a client configuration.
    #[must_use]
    pub fn from_config(cfg: &ClientConfig) -> Self {
        Self {
            concurrency_enabled: cfg.get_bool(
                keys::CONCURRENCY_RATE_LIMIT_SWITCH,
                keys::DEFAULT_CONCURRENCY_RATE_LIMIT_SWITCH,
            ),
            max_total_connections: cfg.get_int(
                keys::MAX_TOTAL_CONNECTIONS,
                keys::DEFAULT_MAX_TOTAL_CONNECTIONS,
            ),
            token_bucket_enabled: cfg.get_bool(
                keys::TOKEN_BUCKET_RATE_LIMIT_SWITCH,
                keys::DEFAULT_TOKEN_BUCKET_RATE_LIMIT_SWITCH,
            ),
            token_bucket_capacity: cfg
                .get_int(keys::TOKEN_BUCKET_CAPACITY, keys::DEFAULT_TOKEN_BUCKET_CAPACITY)
                .max(0) as u64,
            token_bucket_fill_count: cfg
                .get_int(
                    keys::TOKEN_BUCKET_FILL_COUNT,
                    keys::DEFAULT_TOKEN_BUCKET_FILL_COUNT,
                )
                .max(0) as u64,
            token_bucket_fill_interval: cfg.get_duration(
                keys::TOKEN_BUCKET_FILL_INTERVAL,
                keys::DEFAULT_TOKEN_BUCKET_FILL_INTERVAL,
            ),
            leaky_bucket_enabled: cfg.get_bool(
                keys::LEAKY_BUCKET_RATE_LIMIT_SWITCH,
                keys::DEFAULT_LEAKY_BUCKET_RATE_LIMIT_SWITCH,
            ),
            leaky_bucket_capacity: cfg
                .get_int(keys::LEAKY_BUCKET_CAPACITY, keys::DEFAULT_LEAKY_BUCKET_CAPACITY)
                .max(0) as u64,
            leaky_bucket_interval: cfg.get_duration(
                keys::LEAKY_BUCKET_INTERVAL,
                keys::DEFAULT_LEAKY_BUCKET_INTERVAL,
            ),
        }
    }
}

/// The composite admission gate.
#[derive(Debug, Default)]
pub struct AdmissionControl {
    concurrency: Option<Arc<ConcurrencyLimiter>>,
    token: Option<TokenBucket>,
    leaky: Option<LeakyBucket>,
}

impl AdmissionControl {
    /// Build the gate from resolved configuration.
    #[must_use]
    pub fn new(cfg: &AdmissionConfig) -> Self {
        Self {
            concurrency: cfg
                .concurrency_enabled
                .then(|| Arc::new(ConcurrencyLimiter::new(cfg.max_total_connections))),
            token: cfg.token_bucket_enabled.then(|| {
                TokenBucket::new(
                    cfg.token_bucket_capacity,
                    cfg.token_bucket_fill_count,
                    cfg.token_bucket_fill_interval,
                )
            }),
            leaky: cfg
                .leaky_bucket_enabled
                .then(|| LeakyBucket::new(cfg.leaky_bucket_capacity, cfg.leaky_bucket_interval)),
        }
    }

    /// A gate with every limiter disabled.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Try to admit one request at `now`.
    pub fn try_admit_at(&self, now: Instant) -> Result<AdmissionPermit, ThrottleKind> {
        let slot = match &self.concurrency {
            Some(limiter) => {
                if !limiter.try_acquire() {
                    return Err(ThrottleKind::Concurrency);
                }
                Some(Arc::clone(limiter))
            }
            None => None,
        };
        let permit = AdmissionPermit { slot };

        if let Some(bucket) = &self.token {
            if !bucket.try_acquire_at(now) {
                // The permit drop hands the concurrency slot back.
                return Err(ThrottleKind::TokenBucket);
            }
        }
        if let Some(bucket) = &self.leaky {
            if !bucket.try_admit_at(now) {
                return Err(ThrottleKind::LeakyBucket);
            }
        }

        Ok(permit)
    }

    /// Try to admit one request now.
    pub fn try_admit(&self) -> Result<AdmissionPermit, ThrottleKind> {
        self.try_admit_at(Instant::now())
    }

    /// Currently held concurrency slots, when that limiter is enabled.
    #[must_use]
    pub fn in_flight(&self) -> Option<i64> {
        self.concurrency.as_ref().map(|l| l.in_flight())
    }
}

/// Proof of admission. Dropping it releases the concurrency slot; token and
/// leaky bucket grants are consumed, not held.
#[derive(Debug)]
pub struct AdmissionPermit {
    slot: Option<Arc<ConcurrencyLimiter>>,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        if let Some(limiter) = self.slot.take() {
            limiter.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(concurrency: bool, token: bool, leaky: bool) -> AdmissionConfig {
        AdmissionConfig {
            concurrency_enabled: concurrency,
            max_total_connections: 2,
            token_bucket_enabled: token,
            token_bucket_capacity: 2,
            token_bucket_fill_count: 1,
            token_bucket_fill_interval: Duration::from_secs(1),
            leaky_bucket_enabled: leaky,
            leaky_bucket_capacity: 2,
            leaky_bucket_interval: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_disabled_gate_admits_everything() {
        let gate = AdmissionControl::disabled();
        for _ in 0..1000 {
            assert!(gate.try_admit().is_ok());
        }
        assert_eq!(gate.in_flight(), None);
    }

    #[test]
    fn test_concurrency_slots_release_on_drop() {
        let gate = AdmissionControl::new(&config(true, false, false));

        let first = gate.try_admit().unwrap();
        let _second = gate.try_admit().unwrap();
        assert_eq!(gate.in_flight(), Some(2));
        assert_eq!(gate.try_admit().unwrap_err(), ThrottleKind::Concurrency);

        drop(first);
        assert_eq!(gate.in_flight(), Some(1));
        assert!(gate.try_admit().is_ok());
    }

    #[test]
    fn test_token_rejection_releases_concurrency_slot() {
        let gate = AdmissionControl::new(&config(true, true, false));
        let t0 = Instant::now();

        // Drain the token bucket while holding no slots afterwards.
        let a = gate.try_admit_at(t0).unwrap();
        let b = gate.try_admit_at(t0).unwrap();
        drop(a);
        drop(b);

        // Tokens are gone but concurrency slots are free: rejection must
        // come from the token bucket and must not leak the slot it took.
        assert_eq!(gate.try_admit_at(t0).unwrap_err(), ThrottleKind::TokenBucket);
        assert_eq!(gate.in_flight(), Some(0));
    }

    #[test]
    fn test_fixed_check_order() {
        // Concurrency cap of zero rejects before the (also exhausted)
        // token bucket is consulted.
        let mut cfg = config(true, true, false);
        cfg.max_total_connections = 0;
        let gate = AdmissionControl::new(&cfg);

        assert_eq!(gate.try_admit().unwrap_err(), ThrottleKind::Concurrency);
    }

    #[test]
    fn test_leaky_checked_last() {
        let mut cfg = config(false, false, true);
        cfg.leaky_bucket_capacity = 1;
        let gate = AdmissionControl::new(&cfg);
        let t0 = Instant::now();

        assert!(gate.try_admit_at(t0).is_ok());
        assert_eq!(gate.try_admit_at(t0).unwrap_err(), ThrottleKind::LeakyBucket);
    }

    #[test]
    fn test_from_config_defaults_off() {
        let cfg = ClientConfig::with_defaults("orders");
        let admission = AdmissionConfig::from_config(&cfg);
        assert!(!admission.concurrency_enabled);
        assert!(!admission.token_bucket_enabled);
        assert!(!admission.leaky_bucket_enabled);
    }
}
