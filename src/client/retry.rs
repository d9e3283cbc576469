//! Retry budgets.

use crate::config::{keys, ClientConfig};

/// How many times a failed dispatch may be retried, and on what.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries allowed against the same pick before moving on.
    pub max_same_server: u32,
    /// Fresh-server retries allowed after the same-server budget is spent.
    pub max_next_server: u32,
    /// Treat every method as retryable, not just idempotent ones.
    pub retry_on_all_operations: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_same_server: keys::DEFAULT_MAX_AUTO_RETRIES as u32,
            max_next_server: keys::DEFAULT_MAX_AUTO_RETRIES_NEXT_SERVER as u32,
            retry_on_all_operations: keys::DEFAULT_OK_TO_RETRY_ON_ALL_OPERATIONS,
        }
    }
}

impl RetryPolicy {
    /// Resolve from a client (or per-request) configuration.
    #[must_use]
    pub fn from_config(cfg: &ClientConfig) -> Self {
        Self {
            max_same_server: cfg
                .get_int(keys::MAX_AUTO_RETRIES, keys::DEFAULT_MAX_AUTO_RETRIES)
                .max(0) as u32,
            max_next_server: cfg
                .get_int(
                    keys::MAX_AUTO_RETRIES_NEXT_SERVER,
                    keys::DEFAULT_MAX_AUTO_RETRIES_NEXT_SERVER,
                )
                .max(0) as u32,
            retry_on_all_operations: cfg.get_bool(
                keys::OK_TO_RETRY_ON_ALL_OPERATIONS,
                keys::DEFAULT_OK_TO_RETRY_ON_ALL_OPERATIONS,
            ),
        }
    }

    /// Total executor invocations a fully failing call can burn through.
    #[must_use]
    pub fn max_invocations(&self) -> u32 {
        (1 + self.max_same_server) * (1 + self.max_next_server)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_same_server, 0);
        assert_eq!(policy.max_next_server, 1);
        assert!(!policy.retry_on_all_operations);
        assert_eq!(policy.max_invocations(), 2);
    }

    #[test]
    fn test_from_config() {
        let mut cfg = ClientConfig::with_defaults("orders");
        cfg.set(keys::MAX_AUTO_RETRIES, 2i64)
            .set(keys::MAX_AUTO_RETRIES_NEXT_SERVER, 3i64)
            .set(keys::OK_TO_RETRY_ON_ALL_OPERATIONS, true);

        let policy = RetryPolicy::from_config(&cfg);
        assert_eq!(policy.max_same_server, 2);
        assert_eq!(policy.max_next_server, 3);
        assert!(policy.retry_on_all_operations);
        assert_eq!(policy.max_invocations(), 12);
    }

    #[test]
    fn test_negative_config_clamps_to_zero() {
        let mut cfg = ClientConfig::with_defaults("orders");
        cfg.set(keys::MAX_AUTO_RETRIES, -5i64);
        let policy = RetryPolicy::from_config(&cfg);
        assert_eq!(policy.max_same_server, 0);
    }
}
