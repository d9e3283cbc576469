//! # Selection rules
//!
//! A [`Rule`] picks one server out of the balancer's available set. Rules
//! receive the balancer by reference for lookups (current list, up view,
//! per-server stats) and never mutate it; their own state — a cursor, a
//! weight table — lives inside the rule behind atomics or a lock.
//!
//! [`for_name`] resolves the `loadBalancerRule` property to a built-in
//! rule. [`ZoneAwareRule`] is not name-constructible because it needs the
//! caller's zone; build it explicitly and hand it to the balancer builder.

pub mod availability_filtering;
pub mod best_available;
pub mod random;
pub mod round_robin;
pub mod weighted_response_time;
pub mod zone_aware;

pub use availability_filtering::AvailabilityFilteringRule;
pub use best_available::BestAvailableRule;
pub use random::RandomRule;
pub use round_robin::RoundRobinRule;
pub use weighted_response_time::WeightedResponseTimeRule;
pub use zone_aware::ZoneAwareRule;

use crate::balancer::LoadBalancer;
use crate::server::Server;
use std::sync::Arc;

/// A server selection policy.
pub trait Rule: Send + Sync {
    /// Pick a server, or `None` when nothing passes the availability
    /// checks. `key` is an opaque partition hint some rules honor.
    fn choose(&self, lb: &LoadBalancer, key: Option<&str>) -> Option<Server>;

    /// The rule's configuration name.
    fn name(&self) -> &'static str;

    /// Rebuild derived state. Driven periodically by the balancer; the
    /// default does nothing.
    fn refresh(&self, _lb: &LoadBalancer) {}
}

/// Resolve a rule by its configuration name.
#[must_use]
pub fn for_name(name: &str) -> Option<Arc<dyn Rule>> {
    match name {
        "RoundRobin" => Some(Arc::new(RoundRobinRule::new())),
        "Random" => Some(Arc::new(RandomRule::new())),
        "WeightedResponseTime" => Some(Arc::new(WeightedResponseTimeRule::new())),
        "AvailabilityFiltering" => Some(Arc::new(AvailabilityFilteringRule::new())),
        "BestAvailable" => Some(Arc::new(BestAvailableRule::new())),
        _ => None,
    }
}
