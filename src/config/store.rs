//! The layered per-client configuration store.

use super::error::ConfigResult;
use super::keys;
use super::properties::{Properties, PropertyValue};
use std::time::Duration;

/// Layered configuration for one logical client.
///
/// Constructed once before traffic starts; dispatch reads it without
/// synchronization. [`ClientConfig::set`] after load is supported for test
/// and bootstrap fluency but is not synchronized against concurrent reads.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    client_name: String,
    external: Properties,
    internal: Properties,
}

impl ClientConfig {
    /// Create a config for `client_name`, resolving defaults against the
    /// supplied external properties.
    #[must_use]
    pub fn new(client_name: impl Into<String>, external: Properties) -> Self {
        let mut cfg = Self {
            client_name: String::new(),
            external,
            internal: Properties::new(),
        };
        cfg.load(&client_name.into());
        cfg
    }

    /// Create a config with no external properties; every key holds its
    /// default.
    #[must_use]
    pub fn with_defaults(client_name: impl Into<String>) -> Self {
        Self::new(client_name, Properties::new())
    }

    /// Parse a TOML document into the external layer and load.
    pub fn from_toml_str(client_name: impl Into<String>, input: &str) -> ConfigResult<Self> {
        Ok(Self::new(client_name, Properties::from_toml_str(input)?))
    }

    /// The logical client name.
    #[must_use]
    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    /// Re-resolve the internal layer for `client_name`: install every
    /// default (bare external keys win over defaults), then copy
    /// `client_name.`-prefixed external keys, prefix stripped, over the
    /// result.
    pub fn load(&mut self, client_name: &str) {
        self.client_name = client_name.to_string();
        self.load_defaults();

        let prefix = format!("{client_name}.");
        let scoped: Vec<(String, PropertyValue)> = self
            .external
            .with_prefix_stripped(&prefix)
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        for (key, value) in scoped {
            self.internal.set(key, value);
        }
    }

    fn put_default(&mut self, key: &str, default: impl Into<PropertyValue>) {
        let value = self.external.get(key).cloned().unwrap_or_else(|| default.into());
        self.internal.set(key, value);
    }

    fn load_defaults(&mut self) {
        self.put_default(
            keys::ENABLE_CONNECTION_POOL,
            keys::DEFAULT_ENABLE_CONNECTION_POOL,
        );
        self.put_default(
            keys::MAX_CONNECTIONS_PER_HOST,
            keys::DEFAULT_MAX_CONNECTIONS_PER_HOST,
        );
        self.put_default(
            keys::MAX_TOTAL_CONNECTIONS,
            keys::DEFAULT_MAX_TOTAL_CONNECTIONS,
        );
        self.put_default(keys::CONNECT_TIMEOUT, keys::DEFAULT_CONNECT_TIMEOUT);
        self.put_default(keys::READ_WRITE_TIMEOUT, keys::DEFAULT_READ_WRITE_TIMEOUT);
        self.put_default(keys::REQUEST_TIMEOUT, keys::DEFAULT_REQUEST_TIMEOUT);
        self.put_default(keys::MAX_AUTO_RETRIES, keys::DEFAULT_MAX_AUTO_RETRIES);
        self.put_default(
            keys::MAX_AUTO_RETRIES_NEXT_SERVER,
            keys::DEFAULT_MAX_AUTO_RETRIES_NEXT_SERVER,
        );
        self.put_default(
            keys::OK_TO_RETRY_ON_ALL_OPERATIONS,
            keys::DEFAULT_OK_TO_RETRY_ON_ALL_OPERATIONS,
        );
        self.put_default(keys::LIST_OF_SERVERS, keys::DEFAULT_LIST_OF_SERVERS);
        self.put_default(
            keys::LIST_OF_SERVERS_POLLING_INTERVAL,
            keys::DEFAULT_LIST_OF_SERVERS_POLLING_INTERVAL,
        );
        self.put_default(keys::PORT, keys::DEFAULT_PORT);
        self.put_default(
            keys::CONNECTION_FAILURE_THRESHOLD,
            keys::DEFAULT_CONNECTION_FAILURE_THRESHOLD,
        );
        self.put_default(
            keys::CIRCUIT_TRIPPED_TIMEOUT_FACTOR,
            keys::DEFAULT_CIRCUIT_TRIPPED_TIMEOUT_FACTOR,
        );
        self.put_default(
            keys::CIRCUIT_TRIP_MAX_TIMEOUT,
            keys::DEFAULT_CIRCUIT_TRIP_MAX_TIMEOUT,
        );
        self.put_default(keys::PING_INTERVAL, keys::DEFAULT_PING_INTERVAL);
        self.put_default(keys::PING_STRATEGY, keys::DEFAULT_PING_STRATEGY);
        self.put_default(keys::LOAD_BALANCER_RULE, keys::DEFAULT_LOAD_BALANCER_RULE);
        self.put_default(keys::LOAD_BALANCER_KEY, keys::DEFAULT_LOAD_BALANCER_KEY);
        self.put_default(
            keys::CONCURRENCY_RATE_LIMIT_SWITCH,
            keys::DEFAULT_CONCURRENCY_RATE_LIMIT_SWITCH,
        );
        self.put_default(
            keys::TOKEN_BUCKET_RATE_LIMIT_SWITCH,
            keys::DEFAULT_TOKEN_BUCKET_RATE_LIMIT_SWITCH,
        );
        self.put_default(
            keys::TOKEN_BUCKET_CAPACITY,
            keys::DEFAULT_TOKEN_BUCKET_CAPACITY,
        );
        self.put_default(
            keys::TOKEN_BUCKET_FILL_INTERVAL,
            keys::DEFAULT_TOKEN_BUCKET_FILL_INTERVAL,
        );
        self.put_default(
            keys::TOKEN_BUCKET_FILL_COUNT,
            keys::DEFAULT_TOKEN_BUCKET_FILL_COUNT,
        );
        self.put_default(
            keys::LEAKY_BUCKET_RATE_LIMIT_SWITCH,
            keys::DEFAULT_LEAKY_BUCKET_RATE_LIMIT_SWITCH,
        );
        self.put_default(
            keys::LEAKY_BUCKET_CAPACITY,
            keys::DEFAULT_LEAKY_BUCKET_CAPACITY,
        );
        self.put_default(
            keys::LEAKY_BUCKET_INTERVAL,
            keys::DEFAULT_LEAKY_BUCKET_INTERVAL,
        );
        self.put_default(
            keys::REQUEST_COUNTS_SLIDING_WINDOW_SIZE,
            keys::DEFAULT_REQUEST_COUNTS_SLIDING_WINDOW_SIZE,
        );
        self.put_default(
            keys::RESPONSE_TIME_WINDOW_SIZE,
            keys::DEFAULT_RESPONSE_TIME_WINDOW_SIZE,
        );
    }

    /// Boolean getter; falls back to `default` on a missing or uncoercible
    /// value.
    #[must_use]
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.internal
            .get(key)
            .and_then(PropertyValue::as_bool)
            .unwrap_or(default)
    }

    /// Integer getter; falls back to `default` on a missing or uncoercible
    /// value.
    #[must_use]
    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        self.internal
            .get(key)
            .and_then(PropertyValue::as_int)
            .unwrap_or(default)
    }

    /// Float getter; falls back to `default` on a missing or uncoercible
    /// value.
    #[must_use]
    pub fn get_float(&self, key: &str, default: f64) -> f64 {
        self.internal
            .get(key)
            .and_then(PropertyValue::as_float)
            .unwrap_or(default)
    }

    /// String getter; falls back to `default` when the key is missing.
    #[must_use]
    pub fn get_string(&self, key: &str, default: &str) -> String {
        self.internal
            .get(key)
            .map(PropertyValue::as_string)
            .unwrap_or_else(|| default.to_string())
    }

    /// Duration getter; falls back to `default` on a missing or uncoercible
    /// value.
    #[must_use]
    pub fn get_duration(&self, key: &str, default: Duration) -> Duration {
        self.internal
            .get(key)
            .and_then(PropertyValue::as_duration)
            .unwrap_or(default)
    }

    /// Write `key` into the internal layer. Chainable.
    pub fn set(&mut self, key: &str, value: impl Into<PropertyValue>) -> &mut Self {
        self.internal.set(key, value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_installed() {
        let cfg = ClientConfig::with_defaults("orders");
        assert_eq!(cfg.client_name(), "orders");
        assert_eq!(
            cfg.get_int(keys::MAX_CONNECTIONS_PER_HOST, 0),
            keys::DEFAULT_MAX_CONNECTIONS_PER_HOST
        );
        assert_eq!(
            cfg.get_duration(keys::REQUEST_TIMEOUT, Duration::ZERO),
            keys::DEFAULT_REQUEST_TIMEOUT
        );
        assert_eq!(
            cfg.get_string(keys::LOAD_BALANCER_RULE, ""),
            keys::DEFAULT_LOAD_BALANCER_RULE
        );
        assert!(!cfg.get_bool(keys::TOKEN_BUCKET_RATE_LIMIT_SWITCH, true));
    }

    #[test]
    fn test_bare_external_key_overrides_default() {
        let mut external = Properties::new();
        external.set(keys::MAX_TOTAL_CONNECTIONS, 500i64);
        let cfg = ClientConfig::new("orders", external);
        assert_eq!(cfg.get_int(keys::MAX_TOTAL_CONNECTIONS, 0), 500);
    }

    #[test]
    fn test_scoped_key_wins_over_bare() {
        let mut external = Properties::new();
        external
            .set(keys::MAX_AUTO_RETRIES, 1i64)
            .set("orders.maxAutoRetries", 4i64)
            .set("billing.maxAutoRetries", 9i64);
        let cfg = ClientConfig::new("orders", external);
        assert_eq!(cfg.get_int(keys::MAX_AUTO_RETRIES, 0), 4);
    }

    #[test]
    fn test_coercion_failure_returns_default() {
        let mut cfg = ClientConfig::with_defaults("orders");
        cfg.set(keys::MAX_AUTO_RETRIES, "not a number");
        assert_eq!(cfg.get_int(keys::MAX_AUTO_RETRIES, 7), 7);

        cfg.set(keys::PING_INTERVAL, "not a duration");
        assert_eq!(
            cfg.get_duration(keys::PING_INTERVAL, Duration::from_secs(1)),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn test_set_is_chainable() {
        let mut cfg = ClientConfig::with_defaults("orders");
        cfg.set(keys::MAX_AUTO_RETRIES, 3i64)
            .set(keys::LOAD_BALANCER_RULE, "Random")
            .set(keys::REQUEST_TIMEOUT, Duration::from_secs(3));
        assert_eq!(cfg.get_int(keys::MAX_AUTO_RETRIES, 0), 3);
        assert_eq!(cfg.get_string(keys::LOAD_BALANCER_RULE, ""), "Random");
        assert_eq!(
            cfg.get_duration(keys::REQUEST_TIMEOUT, Duration::ZERO),
            Duration::from_secs(3)
        );
    }

    #[test]
    fn test_duration_from_string_property() {
        let cfg = ClientConfig::from_toml_str(
            "orders",
            r#"
            [orders]
            requestTimeout = "250ms"
            "#,
        )
        .unwrap();
        assert_eq!(
            cfg.get_duration(keys::REQUEST_TIMEOUT, Duration::ZERO),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn test_reload_for_other_client() {
        let mut external = Properties::new();
        external
            .set("orders.maxAutoRetries", 4i64)
            .set("billing.maxAutoRetries", 9i64);
        let mut cfg = ClientConfig::new("orders", external);
        assert_eq!(cfg.get_int(keys::MAX_AUTO_RETRIES, 0), 4);

        cfg.load("billing");
        assert_eq!(cfg.client_name(), "billing");
        assert_eq!(cfg.get_int(keys::MAX_AUTO_RETRIES, 0), 9);
    }
}
