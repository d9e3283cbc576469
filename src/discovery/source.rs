//! Pluggable origins for the candidate server list.

use super::DiscoveryError;
use crate::config::{keys, ClientConfig};
use crate::server::Server;
use crate::BoxFuture;

/// Where the balancer's candidate servers come from.
///
/// `initial_servers` seeds the pool at construction;
/// `updated_servers` is polled on the refresh interval. The two are
/// distinct because some providers answer the first call from a snapshot
/// and the second from a registry query.
pub trait ServerListSource: Send + Sync {
    /// The seed list used at balancer construction.
    fn initial_servers(&self) -> BoxFuture<'_, Result<Vec<Server>, DiscoveryError>>;

    /// The refreshed list used by the polling loop.
    fn updated_servers(&self) -> BoxFuture<'_, Result<Vec<Server>, DiscoveryError>>;
}

/// A fixed list, typically parsed from the `listOfServers` property.
#[derive(Debug, Clone, Default)]
pub struct StaticServerList {
    servers: Vec<Server>,
}

impl StaticServerList {
    /// Wrap an explicit list.
    #[must_use]
    pub fn new(servers: Vec<Server>) -> Self {
        Self { servers }
    }

    /// Parse the `listOfServers` property, applying the configured default
    /// port to bare host entries.
    #[must_use]
    pub fn from_config(cfg: &ClientConfig) -> Self {
        let list = cfg.get_string(keys::LIST_OF_SERVERS, keys::DEFAULT_LIST_OF_SERVERS);
        let default_port = cfg.get_int(keys::PORT, keys::DEFAULT_PORT).clamp(1, 65535) as u16;
        Self::new(Server::parse_list(&list, default_port))
    }

    /// The wrapped servers.
    #[must_use]
    pub fn servers(&self) -> &[Server] {
        &self.servers
    }
}

impl ServerListSource for StaticServerList {
    fn initial_servers(&self) -> BoxFuture<'_, Result<Vec<Server>, DiscoveryError>> {
        let servers = self.servers.clone();
        Box::pin(async move { Ok(servers) })
    }

    fn updated_servers(&self) -> BoxFuture<'_, Result<Vec<Server>, DiscoveryError>> {
        self.initial_servers()
    }
}

/// A dynamic list backed by a user-supplied provider.
///
/// The provider is called for both the initial fetch and every refresh.
pub struct ProviderServerList<F>
where
    F: Fn() -> BoxFuture<'static, Result<Vec<Server>, DiscoveryError>> + Send + Sync,
{
    provider: F,
}

impl<F> ProviderServerList<F>
where
    F: Fn() -> BoxFuture<'static, Result<Vec<Server>, DiscoveryError>> + Send + Sync,
{
    /// Wrap a provider closure.
    pub fn new(provider: F) -> Self {
        Self { provider }
    }
}

impl<F> ServerListSource for ProviderServerList<F>
where
    F: Fn() -> BoxFuture<'static, Result<Vec<Server>, DiscoveryError>> + Send + Sync,
{
    fn initial_servers(&self) -> BoxFuture<'_, Result<Vec<Server>, DiscoveryError>> {
        (self.provider)()
    }

    fn updated_servers(&self) -> BoxFuture<'_, Result<Vec<Server>, DiscoveryError>> {
        (self.provider)()
    }
}

impl<F> std::fmt::Debug for ProviderServerList<F>
where
    F: Fn() -> BoxFuture<'static, Result<Vec<Server>, DiscoveryError>> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderServerList").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_static_list_round_trips() {
        let source = StaticServerList::new(vec![Server::new("a", 80), Server::new("b", 80)]);
        let initial = source.initial_servers().await.unwrap();
        let updated = source.updated_servers().await.unwrap();
        assert_eq!(initial, updated);
        assert_eq!(initial.len(), 2);
    }

    #[tokio::test]
    async fn test_static_list_from_config() {
        let mut cfg = ClientConfig::with_defaults("orders");
        cfg.set(keys::LIST_OF_SERVERS, "a:8080,b, c:9090")
            .set(keys::PORT, 7000i64);
        let source = StaticServerList::from_config(&cfg);
        let ids: Vec<&str> = source.servers().iter().map(Server::id).collect();
        assert_eq!(ids, vec!["a:8080", "b:7000", "c:9090"]);
    }

    #[tokio::test]
    async fn test_provider_list_calls_through() {
        let calls = Arc::new(AtomicU32::new(0));
        let counted = Arc::clone(&calls);
        let source = ProviderServerList::new(move || {
            counted.fetch_add(1, Ordering::Relaxed);
            Box::pin(async { Ok(vec![Server::new("dynamic", 80)]) })
        });

        let initial = source.initial_servers().await.unwrap();
        assert_eq!(initial[0].id(), "dynamic:80");
        source.updated_servers().await.unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_provider_list_propagates_errors() {
        let source = ProviderServerList::new(|| {
            Box::pin(async { Err(DiscoveryError::Source("registry down".to_string())) })
        });
        assert!(source.updated_servers().await.is_err());
    }
}
