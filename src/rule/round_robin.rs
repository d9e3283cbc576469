//! Round robin selection.

use super::Rule;
use crate::balancer::LoadBalancer;
use crate::server::Server;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

/// Walks the up set with an atomic cursor, skipping servers that fail the
/// availability checks for up to one full lap.
#[derive(Debug, Default)]
pub struct RoundRobinRule {
    cursor: AtomicUsize,
}

impl RoundRobinRule {
    /// Create a rule with the cursor at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick the next candidate from an already-filtered slice. Used by
    /// composite rules that did their own availability filtering.
    #[must_use]
    pub fn pick_from(&self, candidates: &[Server]) -> Option<Server> {
        if candidates.is_empty() {
            return None;
        }
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % candidates.len();
        Some(candidates[idx].clone())
    }
}

impl Rule for RoundRobinRule {
    fn choose(&self, lb: &LoadBalancer, _key: Option<&str>) -> Option<Server> {
        let candidates = lb.up_servers();
        if candidates.is_empty() {
            return None;
        }

        let now = Instant::now();
        for _ in 0..candidates.len() {
            let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % candidates.len();
            let server = &candidates[idx];
            if lb.is_available(server, now) {
                return Some(server.clone());
            }
        }
        None
    }

    fn name(&self) -> &'static str {
        "RoundRobin"
    }
}
