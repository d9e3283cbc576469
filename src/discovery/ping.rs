//! Liveness probing.

use crate::config::{keys, ClientConfig};
use crate::server::Server;
use crate::BoxFuture;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::warn;

/// A liveness probe for one server.
///
/// Implementations answer `false` on any probe error; a server that cannot
/// be probed is down for that cycle only.
pub trait Ping: Send + Sync {
    /// Whether `server` answers its probe.
    fn is_alive<'a>(&'a self, server: &'a Server) -> BoxFuture<'a, bool>;
}

/// Probe that considers every server alive.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPing;

impl Ping for NoopPing {
    fn is_alive<'a>(&'a self, _server: &'a Server) -> BoxFuture<'a, bool> {
        Box::pin(async { true })
    }
}

/// Probe that opens (and immediately drops) a TCP connection.
#[derive(Debug, Clone, Copy)]
pub struct TcpPing {
    connect_timeout: Duration,
}

impl TcpPing {
    /// Create a probe with the given connect timeout.
    #[must_use]
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    /// Create a probe using the configured `connectTimeout`.
    #[must_use]
    pub fn from_config(cfg: &ClientConfig) -> Self {
        Self::new(cfg.get_duration(keys::CONNECT_TIMEOUT, keys::DEFAULT_CONNECT_TIMEOUT))
    }
}

impl Default for TcpPing {
    fn default() -> Self {
        Self::new(keys::DEFAULT_CONNECT_TIMEOUT)
    }
}

impl Ping for TcpPing {
    fn is_alive<'a>(&'a self, server: &'a Server) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            let address = server.host_port();
            match timeout(self.connect_timeout, TcpStream::connect(&address)).await {
                Ok(Ok(_)) => true,
                Ok(Err(e)) => {
                    warn!(server = %server.id(), error = %e, "ping connect failed");
                    false
                }
                Err(_) => {
                    warn!(server = %server.id(), "ping connect timed out");
                    false
                }
            }
        })
    }
}

/// How a probe sweep walks the server list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingStrategy {
    /// One server at a time.
    Serial,
    /// Up to `max_in_flight` probes at once.
    Parallel {
        /// Concurrent probe bound.
        max_in_flight: usize,
    },
}

impl PingStrategy {
    const DEFAULT_PARALLEL_PROBES: usize = 8;

    /// Parse the `pingStrategy` property. Unknown values fall back to
    /// serial with a warning.
    #[must_use]
    pub fn from_config(cfg: &ClientConfig) -> Self {
        let raw = cfg.get_string(keys::PING_STRATEGY, keys::DEFAULT_PING_STRATEGY);
        match raw.trim().to_ascii_lowercase().as_str() {
            "serial" => Self::Serial,
            "parallel" => Self::Parallel {
                max_in_flight: Self::DEFAULT_PARALLEL_PROBES,
            },
            other => {
                warn!(strategy = other, "unknown ping strategy, using serial");
                Self::Serial
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_noop_ping_always_up() {
        let ping = NoopPing;
        assert!(ping.is_alive(&Server::new("nowhere", 1)).await);
    }

    #[tokio::test]
    async fn test_tcp_ping_up_and_down() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let ping = TcpPing::new(Duration::from_millis(500));
        assert!(ping.is_alive(&Server::new("127.0.0.1", port)).await);

        drop(listener);
        // Nothing listens here any more.
        assert!(!ping.is_alive(&Server::new("127.0.0.1", port)).await);
    }

    #[test]
    fn test_strategy_parsing() {
        let mut cfg = ClientConfig::with_defaults("orders");
        assert_eq!(PingStrategy::from_config(&cfg), PingStrategy::Serial);

        cfg.set(keys::PING_STRATEGY, "Parallel");
        assert_eq!(
            PingStrategy::from_config(&cfg),
            PingStrategy::Parallel { max_in_flight: 8 }
        );

        cfg.set(keys::PING_STRATEGY, "chaotic");
        assert_eq!(PingStrategy::from_config(&cfg), PingStrategy::Serial);
    }
}
