//! Least-loaded selection.

use super::Rule;
use crate::balancer::LoadBalancer;
use crate::server::Server;
use std::time::Instant;

/// Picks the available server with the fewest active requests, breaking
/// ties toward the least recently used one.
#[derive(Debug, Default)]
pub struct BestAvailableRule;

impl BestAvailableRule {
    /// Create the rule.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Rule for BestAvailableRule {
    fn choose(&self, lb: &LoadBalancer, _key: Option<&str>) -> Option<Server> {
        let now = Instant::now();
        let mut best: Option<(Server, i64, u64)> = None;

        for server in lb.available_servers_at(now) {
            let stats = lb.server_stats(&server);
            let active = stats.active_requests();
            let last_accessed = stats.last_accessed_stamp();

            let better = match &best {
                None => true,
                Some((_, best_active, best_accessed)) => {
                    active < *best_active
                        || (active == *best_active && last_accessed < *best_accessed)
                }
            };
            if better {
                best = Some((server, active, last_accessed));
            }
        }

        best.map(|(server, _, _)| server)
    }

    fn name(&self) -> &'static str {
        "BestAvailable"
    }
}
