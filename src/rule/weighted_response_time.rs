//! Selection weighted by observed response times.

use super::round_robin::RoundRobinRule;
use super::Rule;
use crate::balancer::LoadBalancer;
use crate::server::Server;
use rand::Rng;
use std::sync::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
struct WeightTable {
    ids: Vec<String>,
    /// Running sum of per-server weights, forming a CDF over `ids`.
    cumulative: Vec<f64>,
    total: f64,
}

/// Prefers servers with lower mean response time.
///
/// The weight table is rebuilt on the balancer's refresh tick: a server's
/// weight is the pool's summed mean response time minus its own, so slow
/// servers occupy a thin slice of the CDF. Selection draws uniformly in
/// `[0, total)` and walks the CDF. Until enough samples exist to spread
/// the weights, selection falls back to round robin.
#[derive(Debug, Default)]
pub struct WeightedResponseTimeRule {
    weights: RwLock<WeightTable>,
    fallback: RoundRobinRule,
}

impl WeightedResponseTimeRule {
    /// Create the rule with an empty weight table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Rule for WeightedResponseTimeRule {
    fn choose(&self, lb: &LoadBalancer, _key: Option<&str>) -> Option<Server> {
        let candidates = lb.available_servers();
        if candidates.is_empty() {
            return None;
        }

        {
            let table = self.weights.read().expect("weight table lock poisoned");
            if table.total > f64::EPSILON && !table.ids.is_empty() {
                let draw = rand::rng().random_range(0.0..table.total);
                if let Some(idx) = table.cumulative.iter().position(|&edge| draw < edge) {
                    let id = &table.ids[idx];
                    if let Some(server) = candidates.iter().find(|s| s.id() == id) {
                        return Some(server.clone());
                    }
                }
                // The weighted pick is gone or unavailable; fall through.
            }
        }

        self.fallback.pick_from(&candidates)
    }

    fn name(&self) -> &'static str {
        "WeightedResponseTime"
    }

    fn refresh(&self, lb: &LoadBalancer) {
        let servers = lb.servers();
        let means: Vec<(String, f64)> = servers
            .iter()
            .map(|s| {
                let mean = lb.server_stats(s).response_time_summary().mean;
                (s.id().to_string(), mean)
            })
            .collect();
        let total_response_time: f64 = means.iter().map(|(_, m)| m).sum();

        let mut table = WeightTable::default();
        let mut running = 0.0;
        for (id, mean) in means {
            let weight = (total_response_time - mean).max(0.0);
            running += weight;
            table.ids.push(id);
            table.cumulative.push(running);
        }
        table.total = running;

        debug!(
            servers = table.ids.len(),
            total_weight = table.total,
            "response time weights recomputed"
        );
        *self.weights.write().expect("weight table lock poisoned") = table;
    }
}
