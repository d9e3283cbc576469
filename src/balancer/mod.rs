//! # The load balancer
//!
//! [`LoadBalancer`] owns the current server list, the per-server stats
//! registry, the selection rule, the admission gate, and the background
//! tasks that keep the list and the up/down view fresh. Dispatch paths
//! only read: the list is swapped wholesale behind an `Arc`, so a request
//! in flight sees either the old list or the new one, never a blend.
//!
//! Construction is two-phase: a [`LoadBalancerBuilder`] collects the
//! capabilities, then [`LoadBalancerBuilder::build`] fetches the seed list
//! and spawns the pollers. Nothing is mutated on the public surface after
//! that.

pub mod registry;

pub use self::registry::StatsRegistry;

use self::registry::DEFAULT_RETIREMENT_GRACE;
use crate::config::{keys, ClientConfig};
use crate::discovery::tasks::{PingTask, RuleRefreshTask, ServerListPoller};
use crate::discovery::{NoopPing, Ping, PingStrategy, ServerListSource, StaticServerList};
use crate::rate_limit::{AdmissionConfig, AdmissionControl};
use crate::rule::{self, Rule};
use crate::server::{CircuitBreakerConfig, Server, ServerStats};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// How often the rule gets to rebuild derived state.
const RULE_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Client-side load balancer over a refreshing pool of servers.
pub struct LoadBalancer {
    name: String,
    servers: RwLock<Arc<Vec<Server>>>,
    ping_down: RwLock<HashSet<String>>,
    manually_down: RwLock<HashSet<String>>,
    registry: StatsRegistry,
    rule: Arc<dyn Rule>,
    admission: AdmissionControl,
    circuit: CircuitBreakerConfig,
    max_connections_per_host: i64,
    shutdown_txs: Mutex<Vec<mpsc::Sender<()>>>,
}

impl std::fmt::Debug for LoadBalancer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadBalancer")
            .field("name", &self.name)
            .field("servers", &self.servers().len())
            .field("rule", &self.rule.name())
            .finish_non_exhaustive()
    }
}

impl LoadBalancer {
    /// Start building a balancer from resolved configuration.
    #[must_use]
    pub fn builder(config: &ClientConfig) -> LoadBalancerBuilder {
        LoadBalancerBuilder::new(config)
    }

    /// The logical client name this balancer serves.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whole-list snapshot. Cheap: clones an `Arc`.
    #[must_use]
    pub fn servers(&self) -> Arc<Vec<Server>> {
        Arc::clone(&self.servers.read().expect("server list lock poisoned"))
    }

    /// Servers currently considered up: present in the list, not failed by
    /// the last ping cycle, not manually marked down.
    #[must_use]
    pub fn up_servers(&self) -> Vec<Server> {
        let servers = self.servers();
        let ping_down = self.ping_down.read().expect("ping view lock poisoned");
        let manual = self.manually_down.read().expect("down marks lock poisoned");
        servers
            .iter()
            .filter(|s| !ping_down.contains(s.id()) && !manual.contains(s.id()))
            .cloned()
            .collect()
    }

    /// Whether `server` passes every availability check at `now`.
    #[must_use]
    pub fn is_available(&self, server: &Server, now: Instant) -> bool {
        {
            let ping_down = self.ping_down.read().expect("ping view lock poisoned");
            let manual = self.manually_down.read().expect("down marks lock poisoned");
            if ping_down.contains(server.id()) || manual.contains(server.id()) {
                return false;
            }
        }
        let stats = self.registry.get_or_create(server.id());
        if stats.is_circuit_tripped(now) {
            return false;
        }
        self.max_connections_per_host <= 0
            || stats.active_requests() < self.max_connections_per_host
    }

    /// Servers passing every availability check at `now`, in list order.
    #[must_use]
    pub fn available_servers_at(&self, now: Instant) -> Vec<Server> {
        self.servers()
            .iter()
            .filter(|s| self.is_available(s, now))
            .cloned()
            .collect()
    }

    /// Servers passing every availability check right now.
    #[must_use]
    pub fn available_servers(&self) -> Vec<Server> {
        self.available_servers_at(Instant::now())
    }

    /// Pick a server via the configured rule. `key` is an opaque partition
    /// hint some rules use. Returns `None` when nothing is available.
    #[must_use]
    pub fn choose_server(&self, key: Option<&str>) -> Option<Server> {
        let choice = self.rule.choose(self, key);
        if choice.is_none() {
            debug!(client = %self.name, "no available server");
        }
        choice
    }

    /// Force `server` out of the up view until the next ping cycle.
    pub fn mark_server_down(&self, server: &Server) {
        info!(client = %self.name, server = %server.id(), "server manually marked down");
        self.manually_down
            .write()
            .expect("down marks lock poisoned")
            .insert(server.id().to_string());
    }

    /// Shared statistics for `server`.
    #[must_use]
    pub fn server_stats(&self, server: &Server) -> Arc<ServerStats> {
        self.registry.get_or_create(server.id())
    }

    /// Snapshot of every tracked server's statistics, keyed by id.
    #[must_use]
    pub fn stats_snapshot(&self) -> HashMap<String, Arc<ServerStats>> {
        self.registry.snapshot()
    }

    /// Replace the server list atomically. Duplicate ids collapse to their
    /// first occurrence; stats are rekeyed with retirement grace.
    pub fn set_servers(&self, list: Vec<Server>) {
        let mut seen = HashSet::new();
        let deduped: Vec<Server> = list
            .into_iter()
            .filter(|s| seen.insert(s.id().to_string()))
            .collect();
        let ids: HashSet<String> = deduped.iter().map(|s| s.id().to_string()).collect();

        {
            let mut servers = self.servers.write().expect("server list lock poisoned");
            *servers = Arc::new(deduped);
        }
        self.ping_down
            .write()
            .expect("ping view lock poisoned")
            .retain(|id| ids.contains(id));
        self.manually_down
            .write()
            .expect("down marks lock poisoned")
            .retain(|id| ids.contains(id));
        self.registry.rekey(Instant::now(), &ids);
    }

    /// Merge additional servers into the current list.
    pub fn add_servers(&self, additional: Vec<Server>) {
        let mut merged: Vec<Server> = self.servers().as_ref().clone();
        merged.extend(additional);
        self.set_servers(merged);
    }

    /// Install a fresh ping verdict: `down` is the set of ids that failed
    /// probes this cycle. Manual down marks are cleared; the probe result
    /// is now authoritative.
    pub fn apply_ping_results(&self, down: HashSet<String>) {
        {
            let mut ping_down = self.ping_down.write().expect("ping view lock poisoned");
            *ping_down = down;
        }
        self.manually_down
            .write()
            .expect("down marks lock poisoned")
            .clear();
    }

    /// The admission gate owned by this balancer.
    #[must_use]
    pub fn admission(&self) -> &AdmissionControl {
        &self.admission
    }

    /// Circuit breaker tuning.
    #[must_use]
    pub fn circuit_config(&self) -> &CircuitBreakerConfig {
        &self.circuit
    }

    /// Per-host active request cap; non-positive means unlimited.
    #[must_use]
    pub fn max_connections_per_host(&self) -> i64 {
        self.max_connections_per_host
    }

    /// The selection rule.
    #[must_use]
    pub fn rule(&self) -> &Arc<dyn Rule> {
        &self.rule
    }

    /// Stop every background task. Idempotent; in-flight dispatches finish
    /// unaffected.
    pub fn shutdown(&self) {
        info!(client = %self.name, "load balancer shutting down");
        let txs = self.shutdown_txs.lock().expect("shutdown lock poisoned");
        for tx in txs.iter() {
            let _ = tx.try_send(());
        }
    }
}

/// Two-phase builder for [`LoadBalancer`].
pub struct LoadBalancerBuilder {
    name: String,
    rule: Arc<dyn Rule>,
    ping: Arc<dyn Ping>,
    ping_strategy: PingStrategy,
    source: Arc<dyn ServerListSource>,
    poll_interval: Duration,
    ping_interval: Duration,
    window_secs: usize,
    sample_capacity: usize,
    circuit: CircuitBreakerConfig,
    admission: AdmissionConfig,
    max_connections_per_host: i64,
    spawn_tasks: bool,
}

impl LoadBalancerBuilder {
    fn new(config: &ClientConfig) -> Self {
        let rule_name = config.get_string(keys::LOAD_BALANCER_RULE, keys::DEFAULT_LOAD_BALANCER_RULE);
        let rule = rule::for_name(&rule_name).unwrap_or_else(|| {
            warn!(rule = %rule_name, "unknown load balancer rule, using round robin");
            rule::for_name(keys::DEFAULT_LOAD_BALANCER_RULE).expect("default rule exists")
        });

        Self {
            name: config.client_name().to_string(),
            rule,
            ping: Arc::new(NoopPing),
            ping_strategy: PingStrategy::from_config(config),
            source: Arc::new(StaticServerList::from_config(config)),
            poll_interval: config.get_duration(
                keys::LIST_OF_SERVERS_POLLING_INTERVAL,
                keys::DEFAULT_LIST_OF_SERVERS_POLLING_INTERVAL,
            ),
            ping_interval: config.get_duration(keys::PING_INTERVAL, keys::DEFAULT_PING_INTERVAL),
            window_secs: config
                .get_int(
                    keys::REQUEST_COUNTS_SLIDING_WINDOW_SIZE,
                    keys::DEFAULT_REQUEST_COUNTS_SLIDING_WINDOW_SIZE,
                )
                .max(1) as usize,
            sample_capacity: config
                .get_int(
                    keys::RESPONSE_TIME_WINDOW_SIZE,
                    keys::DEFAULT_RESPONSE_TIME_WINDOW_SIZE,
                )
                .max(1) as usize,
            circuit: CircuitBreakerConfig::from_config(config),
            admission: AdmissionConfig::from_config(config),
            max_connections_per_host: config.get_int(
                keys::MAX_CONNECTIONS_PER_HOST,
                keys::DEFAULT_MAX_CONNECTIONS_PER_HOST,
            ),
            spawn_tasks: true,
        }
    }

    /// Replace the selection rule.
    #[must_use]
    pub fn rule(mut self, rule: Arc<dyn Rule>) -> Self {
        self.rule = rule;
        self
    }

    /// Replace the liveness probe.
    #[must_use]
    pub fn ping(mut self, ping: Arc<dyn Ping>) -> Self {
        self.ping = ping;
        self
    }

    /// Override the probe sweep strategy.
    #[must_use]
    pub fn ping_strategy(mut self, strategy: PingStrategy) -> Self {
        self.ping_strategy = strategy;
        self
    }

    /// Replace the server list source.
    #[must_use]
    pub fn server_list_source(mut self, source: Arc<dyn ServerListSource>) -> Self {
        self.source = source;
        self
    }

    /// Skip spawning background tasks. The list stays as seeded and every
    /// server counts as up until told otherwise; meant for tests and
    /// fully static embeddings.
    #[must_use]
    pub fn without_background_tasks(mut self) -> Self {
        self.spawn_tasks = false;
        self
    }

    /// Fetch the seed list and bring the balancer up. Must run inside a
    /// tokio runtime when background tasks are enabled.
    pub async fn build(self) -> Arc<LoadBalancer> {
        let initial = match self.source.initial_servers().await {
            Ok(servers) => servers,
            Err(e) => {
                warn!(client = %self.name, error = %e, "initial server list fetch failed, starting empty");
                Vec::new()
            }
        };

        let lb = Arc::new(LoadBalancer {
            name: self.name,
            servers: RwLock::new(Arc::new(Vec::new())),
            ping_down: RwLock::new(HashSet::new()),
            manually_down: RwLock::new(HashSet::new()),
            registry: StatsRegistry::new(
                self.window_secs,
                self.sample_capacity,
                DEFAULT_RETIREMENT_GRACE,
            ),
            rule: self.rule,
            admission: AdmissionControl::new(&self.admission),
            circuit: self.circuit,
            max_connections_per_host: self.max_connections_per_host,
            shutdown_txs: Mutex::new(Vec::new()),
        });
        lb.set_servers(initial);
        info!(client = %lb.name, servers = lb.servers().len(), rule = lb.rule.name(), "load balancer ready");

        if self.spawn_tasks {
            let (poll_tx, poll_rx) = mpsc::channel(1);
            let (ping_tx, ping_rx) = mpsc::channel(1);
            let (rule_tx, rule_rx) = mpsc::channel(1);
            {
                let mut txs = lb.shutdown_txs.lock().expect("shutdown lock poisoned");
                txs.extend([poll_tx, ping_tx, rule_tx]);
            }

            tokio::spawn(
                ServerListPoller {
                    lb: Arc::clone(&lb),
                    source: self.source,
                    period: self.poll_interval,
                    shutdown: poll_rx,
                }
                .run(),
            );
            tokio::spawn(
                PingTask {
                    lb: Arc::clone(&lb),
                    ping: self.ping,
                    strategy: self.ping_strategy,
                    period: self.ping_interval,
                    shutdown: ping_rx,
                }
                .run(),
            );
            tokio::spawn(
                RuleRefreshTask {
                    lb: Arc::clone(&lb),
                    period: RULE_REFRESH_INTERVAL,
                    shutdown: rule_rx,
                }
                .run(),
            );
        }

        lb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::RequestOutcome;

    async fn balancer_with(servers: &str) -> Arc<LoadBalancer> {
        let mut cfg = ClientConfig::with_defaults("orders");
        cfg.set(keys::LIST_OF_SERVERS, servers);
        LoadBalancer::builder(&cfg)
            .without_background_tasks()
            .build()
            .await
    }

    #[tokio::test]
    async fn test_build_seeds_list() {
        let lb = balancer_with("a:80,b:80").await;
        assert_eq!(lb.servers().len(), 2);
        assert_eq!(lb.up_servers().len(), 2);
        assert_eq!(lb.name(), "orders");

        let snapshot = lb.stats_snapshot();
        assert!(snapshot.contains_key("a:80"));
        assert!(snapshot.contains_key("b:80"));
    }

    #[tokio::test]
    async fn test_choose_returns_available_server() {
        let lb = balancer_with("a:80,b:80").await;
        let server = lb.choose_server(None).unwrap();
        assert!(lb.is_available(&server, Instant::now()));
    }

    #[tokio::test]
    async fn test_choose_empty_pool_returns_none() {
        let lb = balancer_with("").await;
        assert!(lb.choose_server(None).is_none());
    }

    #[tokio::test]
    async fn test_mark_server_down_until_next_ping() {
        let lb = balancer_with("a:80,b:80").await;
        let a = Server::new("a", 80);

        lb.mark_server_down(&a);
        assert_eq!(lb.up_servers().len(), 1);
        for _ in 0..10 {
            assert_ne!(lb.choose_server(None).unwrap().id(), "a:80");
        }

        // Next ping cycle finds everything healthy again.
        lb.apply_ping_results(HashSet::new());
        assert_eq!(lb.up_servers().len(), 2);
    }

    #[tokio::test]
    async fn test_ping_results_exclude_failed_servers() {
        let lb = balancer_with("a:80,b:80").await;

        let mut down = HashSet::new();
        down.insert("b:80".to_string());
        lb.apply_ping_results(down);

        let up = lb.up_servers();
        assert_eq!(up.len(), 1);
        assert_eq!(up[0].id(), "a:80");
    }

    #[tokio::test]
    async fn test_set_servers_swaps_atomically_and_dedups() {
        let lb = balancer_with("a:80").await;
        let snapshot_before = lb.servers();

        lb.set_servers(vec![
            Server::new("b", 80),
            Server::new("c", 80),
            Server::new("b", 80),
        ]);

        // The old snapshot is untouched; the new list is deduplicated.
        assert_eq!(snapshot_before.len(), 1);
        let servers_snapshot = lb.servers();
        let ids: Vec<&str> = servers_snapshot.iter().map(Server::id).collect();
        assert_eq!(ids, vec!["b:80", "c:80"]);
    }

    #[tokio::test]
    async fn test_add_servers_merges() {
        let lb = balancer_with("a:80").await;
        lb.add_servers(vec![Server::new("b", 80), Server::new("a", 80)]);
        assert_eq!(lb.servers().len(), 2);
    }

    #[tokio::test]
    async fn test_tripped_server_is_unavailable() {
        let lb = balancer_with("a:80,b:80").await;
        let a = Server::new("a", 80);
        let now = Instant::now();

        let stats = lb.server_stats(&a);
        for _ in 0..3 {
            stats.note_request_start(now);
            stats.note_request_completion(
                now,
                Duration::from_millis(5),
                RequestOutcome::ConnectionFailure,
            );
        }
        stats.trip_circuit(now, lb.circuit_config());

        assert!(!lb.is_available(&a, now));
        let available = lb.available_servers_at(now);
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].id(), "b:80");

        // Past the trip timeout the server is eligible again.
        let later = now + Duration::from_secs(11);
        assert!(lb.is_available(&a, later));
    }

    #[tokio::test]
    async fn test_per_host_cap_excludes_busy_server() {
        let mut cfg = ClientConfig::with_defaults("orders");
        cfg.set(keys::LIST_OF_SERVERS, "a:80,b:80")
            .set(keys::MAX_CONNECTIONS_PER_HOST, 1i64);
        let lb = LoadBalancer::builder(&cfg)
            .without_background_tasks()
            .build()
            .await;

        let a = Server::new("a", 80);
        lb.server_stats(&a).note_request_start(Instant::now());

        let available = lb.available_servers();
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].id(), "b:80");
    }

    #[tokio::test]
    async fn test_stats_survive_removal_within_grace() {
        let lb = balancer_with("a:80,b:80").await;
        let a = Server::new("a", 80);
        let now = Instant::now();

        let stats = lb.server_stats(&a);
        stats.note_request_start(now);
        stats.note_request_completion(now, Duration::from_millis(5), RequestOutcome::Failure);

        lb.set_servers(vec![Server::new("b", 80)]);
        assert!(lb.choose_server(None).map(|s| s.id() != "a:80").unwrap_or(false));

        lb.set_servers(vec![Server::new("a", 80), Server::new("b", 80)]);
        assert_eq!(lb.server_stats(&a).failed_requests(), 1);
    }

    #[tokio::test]
    async fn test_initial_fetch_failure_starts_empty() {
        use crate::discovery::{DiscoveryError, ProviderServerList};

        let cfg = ClientConfig::with_defaults("orders");
        let lb = LoadBalancer::builder(&cfg)
            .server_list_source(Arc::new(ProviderServerList::new(|| {
                Box::pin(async { Err(DiscoveryError::Source("boom".to_string())) })
            })))
            .without_background_tasks()
            .build()
            .await;

        assert!(lb.servers().is_empty());
        assert!(lb.choose_server(None).is_none());
    }
}
