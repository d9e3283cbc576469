//! Error taxonomy for dispatch outcomes.
//!
//! Every failure a caller can observe is a [`ClientError`]. The variants map
//! onto distinct handling policies: transient transport errors feed the
//! per-server circuit breaker and may be retried, upstream throttle signals
//! are retried on a fresh server, admission rejections and cancellations are
//! terminal.

use http::StatusCode;
use std::fmt;
use thiserror::Error;

/// Which admission layer (or upstream signal) rejected a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleKind {
    /// Global in-flight cap (`maxTotalConnections`).
    Concurrency,
    /// Token bucket admission.
    TokenBucket,
    /// Leaky bucket admission.
    LeakyBucket,
    /// Upstream answered 502/503/504.
    Server,
}

impl fmt::Display for ThrottleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Concurrency => "concurrency limit",
            Self::TokenBucket => "token bucket",
            Self::LeakyBucket => "leaky bucket",
            Self::Server => "server throttled",
        };
        f.write_str(s)
    }
}

/// Errors surfaced to callers of the load-balancing client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Selection yielded no server passing the availability checks.
    #[error("no available server for client '{client}'")]
    NoAvailableServer {
        /// Logical client name.
        client: String,
        /// Last error observed before selection ran dry, if any.
        #[source]
        last: Option<Box<ClientError>>,
    },

    /// Rejected by an admission limiter or an upstream throttle signal.
    #[error("throttled: {0}")]
    Throttled(ThrottleKind),

    /// TCP-level connect failure; no bytes reached the server.
    #[error("connect to {server} failed: {detail}")]
    ConnectFailure {
        /// Target server id.
        server: String,
        /// Transport-supplied detail.
        detail: String,
    },

    /// The connection was established but a read or write timed out.
    #[error("read/write timeout talking to {server}")]
    ReadTimeout {
        /// Target server id.
        server: String,
    },

    /// Any other transport-level failure.
    #[error("transport error talking to {server}: {detail}")]
    Transport {
        /// Target server id.
        server: String,
        /// Transport-supplied detail.
        detail: String,
    },

    /// Upstream produced an error status that is not a throttle signal.
    /// Surfaced as-is; never retried; not held against server health.
    #[error("upstream returned status {status}")]
    Application {
        /// Raw HTTP status code.
        status: u16,
    },

    /// The caller cancelled the request.
    #[error("request cancelled")]
    Cancelled,

    /// The overall request deadline elapsed.
    #[error("request deadline exceeded")]
    DeadlineExceeded,

    /// Configuration or usage error.
    #[error("{0}")]
    General(String),
}

impl ClientError {
    /// Translate an upstream status code into the throttle error the retry
    /// handler understands. Returns `None` for statuses that are not
    /// throttle signals; executors surface those as
    /// [`ClientError::Application`] or as a successful response, their call.
    #[must_use]
    pub fn from_upstream_status(status: StatusCode) -> Option<Self> {
        match status {
            StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT => Some(Self::Throttled(ThrottleKind::Server)),
            _ => None,
        }
    }

    /// Whether the retry handler may re-dispatch after this error.
    ///
    /// Connect failures and upstream throttles never put bytes in front of
    /// the application, so they retry regardless of method. Timeouts and
    /// other transport errors may have partially executed; those retry only
    /// when `idempotent` is true (GET/HEAD/OPTIONS, or the client opted in
    /// to retrying all operations).
    #[must_use]
    pub fn is_retryable(&self, idempotent: bool) -> bool {
        match self {
            Self::ConnectFailure { .. } | Self::Throttled(ThrottleKind::Server) => true,
            Self::ReadTimeout { .. } | Self::Transport { .. } => idempotent,
            _ => false,
        }
    }

    /// Whether this error counts as a connection failure for circuit
    /// breaking purposes.
    #[must_use]
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            Self::ConnectFailure { .. } | Self::ReadTimeout { .. } | Self::Transport { .. }
        )
    }
}

/// Result alias for dispatch operations.
pub type ClientResult<T> = Result<T, ClientError>;
