//! Zone-preferring selection.

use super::round_robin::RoundRobinRule;
use super::Rule;
use crate::balancer::LoadBalancer;
use crate::server::Server;
use std::time::Instant;
use tracing::debug;

/// Prefers servers in the caller's zone, degrading to the whole pool when
/// in-zone health is insufficient.
///
/// "Insufficient" means either no in-zone server is available or the
/// available fraction of in-zone servers dropped below
/// `min_available_ratio` (default one half).
#[derive(Debug)]
pub struct ZoneAwareRule {
    zone: String,
    min_available_ratio: f64,
    inner: RoundRobinRule,
}

impl ZoneAwareRule {
    /// Create a rule preferring `zone`.
    #[must_use]
    pub fn new(zone: impl Into<String>) -> Self {
        Self {
            zone: zone.into(),
            min_available_ratio: 0.5,
            inner: RoundRobinRule::new(),
        }
    }

    /// Override the in-zone availability floor below which the rule spills
    /// to other zones.
    #[must_use]
    pub fn with_min_available_ratio(mut self, ratio: f64) -> Self {
        self.min_available_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    /// The preferred zone.
    #[must_use]
    pub fn zone(&self) -> &str {
        &self.zone
    }
}

impl Rule for ZoneAwareRule {
    fn choose(&self, lb: &LoadBalancer, _key: Option<&str>) -> Option<Server> {
        let now = Instant::now();
        let available = lb.available_servers_at(now);
        if available.is_empty() {
            return None;
        }

        let in_zone_total = lb
            .servers()
            .iter()
            .filter(|s| s.zone() == Some(self.zone.as_str()))
            .count();
        let in_zone: Vec<Server> = available
            .iter()
            .filter(|s| s.zone() == Some(self.zone.as_str()))
            .cloned()
            .collect();

        let healthy_enough = in_zone_total > 0
            && !in_zone.is_empty()
            && (in_zone.len() as f64 / in_zone_total as f64) >= self.min_available_ratio;

        if healthy_enough {
            self.inner.pick_from(&in_zone)
        } else {
            debug!(zone = %self.zone, "in-zone health insufficient, spilling to all zones");
            self.inner.pick_from(&available)
        }
    }

    fn name(&self) -> &'static str {
        "ZoneAware"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::discovery::StaticServerList;
    use crate::server::RequestOutcome;
    use std::sync::Arc;
    use std::time::Duration;

    async fn zoned_balancer() -> Arc<LoadBalancer> {
        let servers = vec![
            Server::new("east1", 80).with_zone("us-east"),
            Server::new("east2", 80).with_zone("us-east"),
            Server::new("west1", 80).with_zone("us-west"),
        ];
        let cfg = ClientConfig::with_defaults("orders");
        LoadBalancer::builder(&cfg)
            .server_list_source(Arc::new(StaticServerList::new(servers)))
            .without_background_tasks()
            .build()
            .await
    }

    fn trip(lb: &LoadBalancer, server: &Server) {
        let stats = lb.server_stats(server);
        let now = Instant::now();
        for _ in 0..3 {
            stats.note_request_start(now);
            stats.note_request_completion(
                now,
                Duration::from_millis(1),
                RequestOutcome::ConnectionFailure,
            );
        }
        stats.trip_circuit(now, lb.circuit_config());
    }

    #[tokio::test]
    async fn test_prefers_own_zone() {
        let lb = zoned_balancer().await;
        let rule = ZoneAwareRule::new("us-east");

        for _ in 0..20 {
            let pick = rule.choose(&lb, None).unwrap();
            assert_eq!(pick.zone(), Some("us-east"));
        }
    }

    #[tokio::test]
    async fn test_degrades_when_zone_unhealthy() {
        let lb = zoned_balancer().await;
        let rule = ZoneAwareRule::new("us-east");

        trip(&lb, &Server::new("east1", 80));
        trip(&lb, &Server::new("east2", 80));

        let pick = rule.choose(&lb, None).unwrap();
        assert_eq!(pick.zone(), Some("us-west"));
    }

    #[tokio::test]
    async fn test_degrades_below_availability_ratio() {
        let lb = zoned_balancer().await;
        // Require the whole zone to be available.
        let rule = ZoneAwareRule::new("us-east").with_min_available_ratio(1.0);

        trip(&lb, &Server::new("east1", 80));
        // One of two east servers left: ratio 0.5 < 1.0, spill everywhere.
        let mut saw_west = false;
        for _ in 0..20 {
            if rule.choose(&lb, None).unwrap().zone() == Some("us-west") {
                saw_west = true;
            }
        }
        assert!(saw_west);
    }

    #[tokio::test]
    async fn test_unknown_zone_uses_whole_pool() {
        let lb = zoned_balancer().await;
        let rule = ZoneAwareRule::new("eu-central");
        assert!(rule.choose(&lb, None).is_some());
    }
}
