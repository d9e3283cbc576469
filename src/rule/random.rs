//! Uniform random selection.

use super::Rule;
use crate::balancer::LoadBalancer;
use crate::server::Server;
use rand::Rng;

/// Picks uniformly at random among the available servers.
#[derive(Debug, Default)]
pub struct RandomRule;

impl RandomRule {
    /// Create the rule.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Rule for RandomRule {
    fn choose(&self, lb: &LoadBalancer, _key: Option<&str>) -> Option<Server> {
        let candidates = lb.available_servers();
        if candidates.is_empty() {
            return None;
        }
        let idx = rand::rng().random_range(0..candidates.len());
        Some(candidates[idx].clone())
    }

    fn name(&self) -> &'static str {
        "Random"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{keys, ClientConfig};
    use std::collections::HashSet;

    #[tokio::test]
    async fn test_spreads_over_available_servers() {
        let mut cfg = ClientConfig::with_defaults("orders");
        cfg.set(keys::LIST_OF_SERVERS, "a:80,b:80,c:80");
        let lb = LoadBalancer::builder(&cfg)
            .without_background_tasks()
            .build()
            .await;
        let rule = RandomRule::new();

        let mut seen = HashSet::new();
        for _ in 0..200 {
            seen.insert(rule.choose(&lb, None).unwrap().id().to_string());
        }
        assert_eq!(seen.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_pool_yields_none() {
        let cfg = ClientConfig::with_defaults("orders");
        let lb = LoadBalancer::builder(&cfg)
            .without_background_tasks()
            .build()
            .await;
        assert!(RandomRule::new().choose(&lb, None).is_none());
    }
}
