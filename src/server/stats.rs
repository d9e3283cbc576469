//! Per-server rolling statistics and circuit breaker state.

use super::distribution::{DistributionSummary, ResponseTimeDistribution};
use super::window::RequestCountWindow;
use crate::config::{keys, ClientConfig};
use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// How a completed request is classified for accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The request succeeded (or failed in a way that says nothing about
    /// server health, e.g. an application-level 4xx).
    Success,
    /// The request failed but the server was reachable (e.g. an upstream
    /// throttle response). Does not feed the circuit breaker.
    Failure,
    /// The request failed at the connection level. Feeds the circuit
    /// breaker.
    ConnectionFailure,
}

/// Circuit breaker tuning, resolved once from configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Successive connection failures before the circuit trips.
    pub failure_threshold: u32,
    /// Base trip timeout; doubles per failure beyond the threshold.
    pub tripped_timeout_base: Duration,
    /// Upper bound on the trip timeout.
    pub max_tripped_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: keys::DEFAULT_CONNECTION_FAILURE_THRESHOLD as u32,
            tripped_timeout_base: Duration::from_secs(
                keys::DEFAULT_CIRCUIT_TRIPPED_TIMEOUT_FACTOR as u64,
            ),
            max_tripped_timeout: keys::DEFAULT_CIRCUIT_TRIP_MAX_TIMEOUT,
        }
    }
}

impl CircuitBreakerConfig {
    /// Resolve from a client configuration. The timeout factor is a count
    /// of seconds.
    #[must_use]
    pub fn from_config(cfg: &ClientConfig) -> Self {
        let threshold = cfg
            .get_int(
                keys::CONNECTION_FAILURE_THRESHOLD,
                keys::DEFAULT_CONNECTION_FAILURE_THRESHOLD,
            )
            .max(1) as u32;
        let base_secs = cfg
            .get_int(
                keys::CIRCUIT_TRIPPED_TIMEOUT_FACTOR,
                keys::DEFAULT_CIRCUIT_TRIPPED_TIMEOUT_FACTOR,
            )
            .max(0) as u64;
        Self {
            failure_threshold: threshold,
            tripped_timeout_base: Duration::from_secs(base_secs),
            max_tripped_timeout: cfg.get_duration(
                keys::CIRCUIT_TRIP_MAX_TIMEOUT,
                keys::DEFAULT_CIRCUIT_TRIP_MAX_TIMEOUT,
            ),
        }
    }
}

/// Rolling statistics for one server, shared across all in-flight requests.
///
/// Timestamps are stored as millisecond offsets from a private origin
/// instant, shifted by one so zero means "never", which keeps every field a
/// plain atomic.
#[derive(Debug)]
pub struct ServerStats {
    origin: Instant,
    active_requests: AtomicI64,
    total_requests: AtomicU64,
    failed_requests: AtomicU64,
    successive_connection_failures: AtomicU32,
    last_connection_failed_ms: AtomicU64,
    last_accessed_ms: AtomicU64,
    tripped_until_ms: AtomicU64,
    window: RequestCountWindow,
    response_times: Mutex<ResponseTimeDistribution>,
}

impl ServerStats {
    /// Create stats with the given completion window width and response
    /// time reservoir size.
    #[must_use]
    pub fn new(window_secs: usize, sample_capacity: usize) -> Self {
        Self {
            origin: Instant::now(),
            active_requests: AtomicI64::new(0),
            total_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            successive_connection_failures: AtomicU32::new(0),
            last_connection_failed_ms: AtomicU64::new(0),
            last_accessed_ms: AtomicU64::new(0),
            tripped_until_ms: AtomicU64::new(0),
            window: RequestCountWindow::new(window_secs),
            response_times: Mutex::new(ResponseTimeDistribution::new(sample_capacity)),
        }
    }

    fn stamp_of(&self, now: Instant) -> u64 {
        now.saturating_duration_since(self.origin).as_millis() as u64 + 1
    }

    /// Currently in-flight requests.
    #[must_use]
    pub fn active_requests(&self) -> i64 {
        self.active_requests.load(Ordering::Acquire)
    }

    /// Requests started since creation.
    #[must_use]
    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    /// Requests that completed as failures (connection-level or not).
    #[must_use]
    pub fn failed_requests(&self) -> u64 {
        self.failed_requests.load(Ordering::Relaxed)
    }

    /// Connection failures observed since the last success.
    #[must_use]
    pub fn successive_connection_failures(&self) -> u32 {
        self.successive_connection_failures.load(Ordering::Acquire)
    }

    /// Monotonic stamp of the last request start; zero means never. Only
    /// meaningful for ordering against other stamps from the same stats.
    #[must_use]
    pub fn last_accessed_stamp(&self) -> u64 {
        self.last_accessed_ms.load(Ordering::Acquire)
    }

    /// Monotonic stamp of the last connection failure; zero means never.
    #[must_use]
    pub fn last_connection_failed_stamp(&self) -> u64 {
        self.last_connection_failed_ms.load(Ordering::Acquire)
    }

    /// Completions within the sliding window as of `now`.
    #[must_use]
    pub fn request_count_in_window(&self, now: Instant) -> u64 {
        self.window.count(now)
    }

    /// Response time summary; recomputes lazily when new samples arrived.
    pub fn response_time_summary(&self) -> DistributionSummary {
        self.response_times
            .lock()
            .expect("response time lock poisoned")
            .summary()
    }

    /// Account a request start.
    pub fn note_request_start(&self, now: Instant) {
        self.active_requests.fetch_add(1, Ordering::AcqRel);
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.last_accessed_ms.store(self.stamp_of(now), Ordering::Release);
    }

    /// Account a request completion observed `elapsed` after its start.
    pub fn note_request_completion(&self, now: Instant, elapsed: Duration, outcome: RequestOutcome) {
        self.release_active();
        self.window.record(now);
        self.response_times
            .lock()
            .expect("response time lock poisoned")
            .record(elapsed.as_secs_f64() * 1000.0);

        match outcome {
            RequestOutcome::Success => {
                self.successive_connection_failures.store(0, Ordering::Release);
            }
            RequestOutcome::Failure => {
                self.failed_requests.fetch_add(1, Ordering::Relaxed);
            }
            RequestOutcome::ConnectionFailure => {
                self.failed_requests.fetch_add(1, Ordering::Relaxed);
                self.successive_connection_failures.fetch_add(1, Ordering::AcqRel);
                self.last_connection_failed_ms
                    .store(self.stamp_of(now), Ordering::Release);
            }
        }
    }

    // Decrement the active gauge without letting it dip below zero.
    fn release_active(&self) {
        let mut current = self.active_requests.load(Ordering::Acquire);
        loop {
            let next = (current - 1).max(0);
            match self.active_requests.compare_exchange_weak(
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

    /// Start a request and return a guard that keeps the active gauge
    /// honest: completing it records the outcome, dropping it without
    /// completion (cancellation, panic) only releases the in-flight slot.
    #[must_use]
    pub fn start_request(self: &Arc<Self>, now: Instant) -> InFlight {
        self.note_request_start(now);
        InFlight {
            stats: Arc::clone(self),
            started: now,
            completed: false,
        }
    }

    /// Whether the circuit is open at `now`.
    #[must_use]
    pub fn is_circuit_tripped(&self, now: Instant) -> bool {
        self.stamp_of(now) < self.tripped_until_ms.load(Ordering::Acquire)
    }

    /// Whether accumulated failures warrant tripping the circuit.
    #[must_use]
    pub fn should_trip(&self, cfg: &CircuitBreakerConfig) -> bool {
        self.successive_connection_failures() >= cfg.failure_threshold
    }

    /// Trip the circuit at `now`. The exclusion lasts
    /// `base × 2^(failures − threshold)` bounded by the configured maximum,
    /// and never shortens an exclusion already in force.
    pub fn trip_circuit(&self, now: Instant, cfg: &CircuitBreakerConfig) {
        let failures = self.successive_connection_failures();
        let excess = failures.saturating_sub(cfg.failure_threshold).min(32);
        let timeout_secs = cfg
            .tripped_timeout_base
            .as_secs()
            .saturating_mul(1u64 << excess);
        let timeout = Duration::from_secs(timeout_secs).min(cfg.max_tripped_timeout);
        let until = self.stamp_of(now).saturating_add(timeout.as_millis() as u64);

        self.tripped_until_ms.fetch_max(until, Ordering::AcqRel);
    }
}

/// Guard tying one in-flight request to its server's gauges.
#[derive(Debug)]
pub struct InFlight {
    stats: Arc<ServerStats>,
    started: Instant,
    completed: bool,
}

impl InFlight {
    /// When the request started.
    #[must_use]
    pub fn started(&self) -> Instant {
        self.started
    }

    /// Record the outcome, measuring elapsed time from the start stamp.
    pub fn complete(mut self, now: Instant, outcome: RequestOutcome) {
        self.completed = true;
        let elapsed = now.saturating_duration_since(self.started);
        self.stats.note_request_completion(now, elapsed, outcome);
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.completed {
            self.stats.release_active();
        }
    }
}
