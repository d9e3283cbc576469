//! Background tasks: list polling, probe sweeps, rule refresh.
//!
//! Every task runs the same loop shape: `tokio::select!` over a shutdown
//! channel and an interval tick with skip-on-miss behavior, so a cycle
//! that overruns its period is dropped instead of piling up.

use super::ping::{Ping, PingStrategy};
use super::source::ServerListSource;
use crate::balancer::LoadBalancer;
use crate::server::Server;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{interval_at, Instant as TokioInstant, MissedTickBehavior};
use tracing::{debug, warn};

fn ticker(period: Duration) -> tokio::time::Interval {
    let period = if period.is_zero() {
        Duration::from_millis(1)
    } else {
        period
    };
    let mut interval = interval_at(TokioInstant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

/// Periodically refreshes the balancer's server list from its source.
pub(crate) struct ServerListPoller {
    pub(crate) lb: Arc<LoadBalancer>,
    pub(crate) source: Arc<dyn ServerListSource>,
    pub(crate) period: Duration,
    pub(crate) shutdown: mpsc::Receiver<()>,
}

impl ServerListPoller {
    pub(crate) async fn run(mut self) {
        debug!(period_secs = self.period.as_secs_f64(), "server list poller started");
        let mut tick = ticker(self.period);
        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    debug!("server list poller shutting down");
                    break;
                }
                _ = tick.tick() => {
                    match self.source.updated_servers().await {
                        Ok(servers) => {
                            debug!(count = servers.len(), "server list refreshed");
                            self.lb.set_servers(servers);
                        }
                        Err(e) => {
                            warn!(error = %e, "server list refresh failed, keeping previous list");
                        }
                    }
                }
            }
        }
    }
}

/// Periodically probes every known server and updates the up/down view.
pub(crate) struct PingTask {
    pub(crate) lb: Arc<LoadBalancer>,
    pub(crate) ping: Arc<dyn Ping>,
    pub(crate) strategy: PingStrategy,
    pub(crate) period: Duration,
    pub(crate) shutdown: mpsc::Receiver<()>,
}

impl PingTask {
    pub(crate) async fn run(mut self) {
        debug!(period_secs = self.period.as_secs_f64(), "pinger started");
        let mut tick = ticker(self.period);
        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    debug!("pinger shutting down");
                    break;
                }
                _ = tick.tick() => {
                    let servers = self.lb.servers();
                    let down = sweep(&self.ping, self.strategy, &servers).await;
                    debug!(total = servers.len(), down = down.len(), "ping cycle complete");
                    self.lb.apply_ping_results(down);
                }
            }
        }
    }
}

/// Probe every server, returning the ids that failed.
pub(crate) async fn sweep(
    ping: &Arc<dyn Ping>,
    strategy: PingStrategy,
    servers: &[Server],
) -> HashSet<String> {
    let mut down = HashSet::new();
    match strategy {
        PingStrategy::Serial => {
            for server in servers {
                if !ping.is_alive(server).await {
                    down.insert(server.id().to_string());
                }
            }
        }
        PingStrategy::Parallel { max_in_flight } => {
            let semaphore = Arc::new(Semaphore::new(max_in_flight.max(1)));
            let mut probes = JoinSet::new();
            for server in servers {
                let ping = Arc::clone(ping);
                let semaphore = Arc::clone(&semaphore);
                let server = server.clone();
                probes.spawn(async move {
                    let _permit = semaphore.acquire_owned().await;
                    let alive = ping.is_alive(&server).await;
                    (server.id().to_string(), alive)
                });
            }
            while let Some(result) = probes.join_next().await {
                match result {
                    Ok((id, alive)) => {
                        if !alive {
                            down.insert(id);
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "probe task failed");
                    }
                }
            }
        }
    }
    down
}

/// Periodically lets the rule rebuild derived state (e.g. response time
/// weights).
pub(crate) struct RuleRefreshTask {
    pub(crate) lb: Arc<LoadBalancer>,
    pub(crate) period: Duration,
    pub(crate) shutdown: mpsc::Receiver<()>,
}

impl RuleRefreshTask {
    pub(crate) async fn run(mut self) {
        let mut tick = ticker(self.period);
        loop {
            tokio::select! {
                _ = self.shutdown.recv() => break,
                _ = tick.tick() => {
                    let rule = Arc::clone(self.lb.rule());
                    rule.refresh(&self.lb);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::ping::NoopPing;

    struct FlakyPing;

    impl Ping for FlakyPing {
        fn is_alive<'a>(&'a self, server: &'a Server) -> crate::BoxFuture<'a, bool> {
            let up = server.port() % 2 == 0;
            Box::pin(async move { up })
        }
    }

    #[tokio::test]
    async fn test_sweep_serial_collects_failures() {
        let ping: Arc<dyn Ping> = Arc::new(FlakyPing);
        let servers = vec![
            Server::new("a", 80),
            Server::new("b", 81),
            Server::new("c", 82),
        ];
        let down = sweep(&ping, PingStrategy::Serial, &servers).await;
        assert_eq!(down.len(), 1);
        assert!(down.contains("b:81"));
    }

    #[tokio::test]
    async fn test_sweep_parallel_matches_serial() {
        let ping: Arc<dyn Ping> = Arc::new(FlakyPing);
        let servers: Vec<Server> = (0..20).map(|i| Server::new("s", 8000 + i)).collect();

        let serial = sweep(&ping, PingStrategy::Serial, &servers).await;
        let parallel = sweep(&ping, PingStrategy::Parallel { max_in_flight: 4 }, &servers).await;
        assert_eq!(serial, parallel);
    }

    #[tokio::test]
    async fn test_sweep_noop_reports_nothing_down() {
        let ping: Arc<dyn Ping> = Arc::new(NoopPing);
        let servers = vec![Server::new("a", 80), Server::new("b", 81)];
        let down = sweep(&ping, PingStrategy::Serial, &servers).await;
        assert!(down.is_empty());
    }
}
