//! Round robin behind an availability predicate.

use super::round_robin::RoundRobinRule;
use super::Rule;
use crate::balancer::LoadBalancer;
use crate::server::Server;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

const MAX_ATTEMPTS: usize = 10;

/// Round robin over servers passing a health predicate (circuit closed and
/// active requests under a limit). After [`MAX_ATTEMPTS`] misses it stops
/// filtering and falls back to plain round robin over the available set.
#[derive(Debug, Default)]
pub struct AvailabilityFilteringRule {
    cursor: AtomicUsize,
    /// Active request limit for the predicate; `None` uses the balancer's
    /// per-host cap.
    active_request_limit: Option<i64>,
    fallback: RoundRobinRule,
}

impl AvailabilityFilteringRule {
    /// Create the rule using the balancer's per-host cap as the predicate
    /// limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a dedicated active request limit instead of the per-host cap.
    #[must_use]
    pub fn with_active_request_limit(mut self, limit: i64) -> Self {
        self.active_request_limit = Some(limit);
        self
    }

    fn passes(&self, lb: &LoadBalancer, server: &Server, now: Instant) -> bool {
        let stats = lb.server_stats(server);
        if stats.is_circuit_tripped(now) {
            return false;
        }
        let limit = self
            .active_request_limit
            .unwrap_or_else(|| lb.max_connections_per_host());
        limit <= 0 || stats.active_requests() < limit
    }
}

impl Rule for AvailabilityFilteringRule {
    fn choose(&self, lb: &LoadBalancer, _key: Option<&str>) -> Option<Server> {
        let candidates = lb.up_servers();
        if candidates.is_empty() {
            return None;
        }

        let now = Instant::now();
        for _ in 0..MAX_ATTEMPTS {
            let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % candidates.len();
            let server = &candidates[idx];
            if self.passes(lb, server, now) {
                return Some(server.clone());
            }
        }

        self.fallback.pick_from(&lb.available_servers_at(now))
    }

    fn name(&self) -> &'static str {
        "AvailabilityFiltering"
    }
}
