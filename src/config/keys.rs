//! Configuration key names and their defaults.
//!
//! Keys may be scoped per client by prefixing them with the client name
//! (`orders.maxAutoRetries`); [`super::ClientConfig::load`] strips the
//! prefix when resolving.

use std::time::Duration;

/// Whether the transport should pool connections.
pub const ENABLE_CONNECTION_POOL: &str = "enableConnectionPool";
/// Per-host active request cap, enforced at server selection time.
pub const MAX_CONNECTIONS_PER_HOST: &str = "maxConnectionsPerHost";
/// Global active request cap, enforced by the concurrency limiter.
pub const MAX_TOTAL_CONNECTIONS: &str = "maxTotalConnections";
/// Transport connect timeout.
pub const CONNECT_TIMEOUT: &str = "connectTimeout";
/// Transport read/write timeout.
pub const READ_WRITE_TIMEOUT: &str = "readWriteTimeout";
/// Overall per-call deadline covering all retries.
pub const REQUEST_TIMEOUT: &str = "requestTimeout";
/// Retries on the same server after a retryable failure.
pub const MAX_AUTO_RETRIES: &str = "maxAutoRetries";
/// Retries on a freshly chosen server after same-server budget runs out.
pub const MAX_AUTO_RETRIES_NEXT_SERVER: &str = "maxAutoRetriesNextServer";
/// Retry non-idempotent methods too.
pub const OK_TO_RETRY_ON_ALL_OPERATIONS: &str = "okToRetryOnAllOperations";
/// Comma-separated `host:port` seed list for the static server list.
pub const LIST_OF_SERVERS: &str = "listOfServers";
/// Interval between server list refreshes.
pub const LIST_OF_SERVERS_POLLING_INTERVAL: &str = "listOfServersPollingInterval";
/// Default port for `listOfServers` entries without one.
pub const PORT: &str = "port";
/// Successive connection failures before the circuit trips.
pub const CONNECTION_FAILURE_THRESHOLD: &str = "connectionFailureThreshold";
/// Circuit trip base timeout, in seconds.
pub const CIRCUIT_TRIPPED_TIMEOUT_FACTOR: &str = "circuitTrippedTimeoutFactor";
/// Upper bound on the circuit trip timeout.
pub const CIRCUIT_TRIP_MAX_TIMEOUT: &str = "circuitTripMaxTimeout";
/// Interval between liveness probe sweeps.
pub const PING_INTERVAL: &str = "pingInterval";
/// Probe sweep strategy: `serial` or `parallel`.
pub const PING_STRATEGY: &str = "pingStrategy";
/// Selection rule name; see `rule::for_name`.
pub const LOAD_BALANCER_RULE: &str = "loadBalancerRule";
/// Default partition hint handed to the rule.
pub const LOAD_BALANCER_KEY: &str = "loadBalancerKey";
/// Enable the global concurrency limiter.
pub const CONCURRENCY_RATE_LIMIT_SWITCH: &str = "concurrencyRateLimitSwitch";
/// Enable the token bucket limiter.
pub const TOKEN_BUCKET_RATE_LIMIT_SWITCH: &str = "tokenBucketRateLimitSwitch";
/// Token bucket capacity.
pub const TOKEN_BUCKET_CAPACITY: &str = "tokenBucketCapacity";
/// Token bucket refill interval.
pub const TOKEN_BUCKET_FILL_INTERVAL: &str = "tokenBucketFillInterval";
/// Tokens added per refill interval.
pub const TOKEN_BUCKET_FILL_COUNT: &str = "tokenBucketFillCount";
/// Enable the leaky bucket limiter.
pub const LEAKY_BUCKET_RATE_LIMIT_SWITCH: &str = "leakyBucketRateLimitSwitch";
/// Leaky bucket capacity.
pub const LEAKY_BUCKET_CAPACITY: &str = "leakyBucketCapacity";
/// Leaky bucket drain interval (one slot per interval).
pub const LEAKY_BUCKET_INTERVAL: &str = "leakyBucketInterval";
/// Width of the per-server request count window, in seconds.
pub const REQUEST_COUNTS_SLIDING_WINDOW_SIZE: &str = "requestCountsSlidingWindowSize";
/// Per-server response time reservoir size, in samples.
pub const RESPONSE_TIME_WINDOW_SIZE: &str = "responseTimeWindowSize";

pub const DEFAULT_ENABLE_CONNECTION_POOL: bool = true;
pub const DEFAULT_MAX_CONNECTIONS_PER_HOST: i64 = 50;
pub const DEFAULT_MAX_TOTAL_CONNECTIONS: i64 = 200;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_READ_WRITE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_AUTO_RETRIES: i64 = 0;
pub const DEFAULT_MAX_AUTO_RETRIES_NEXT_SERVER: i64 = 1;
pub const DEFAULT_OK_TO_RETRY_ON_ALL_OPERATIONS: bool = false;
pub const DEFAULT_LIST_OF_SERVERS: &str = "";
pub const DEFAULT_LIST_OF_SERVERS_POLLING_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_PORT: i64 = 80;
pub const DEFAULT_CONNECTION_FAILURE_THRESHOLD: i64 = 3;
pub const DEFAULT_CIRCUIT_TRIPPED_TIMEOUT_FACTOR: i64 = 10;
pub const DEFAULT_CIRCUIT_TRIP_MAX_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_PING_STRATEGY: &str = "serial";
pub const DEFAULT_LOAD_BALANCER_RULE: &str = "RoundRobin";
pub const DEFAULT_LOAD_BALANCER_KEY: &str = "";
pub const DEFAULT_CONCURRENCY_RATE_LIMIT_SWITCH: bool = false;
pub const DEFAULT_TOKEN_BUCKET_RATE_LIMIT_SWITCH: bool = false;
pub const DEFAULT_TOKEN_BUCKET_CAPACITY: i64 = 100;
pub const DEFAULT_TOKEN_BUCKET_FILL_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_TOKEN_BUCKET_FILL_COUNT: i64 = 10;
pub const DEFAULT_LEAKY_BUCKET_RATE_LIMIT_SWITCH: bool = false;
pub const DEFAULT_LEAKY_BUCKET_CAPACITY: i64 = 100;
pub const DEFAULT_LEAKY_BUCKET_INTERVAL: Duration = Duration::from_millis(10);
pub const DEFAULT_REQUEST_COUNTS_SLIDING_WINDOW_SIZE: i64 = 60;
pub const DEFAULT_RESPONSE_TIME_WINDOW_SIZE: i64 = 1000;
