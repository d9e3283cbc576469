//! # The load-balanced client
//!
//! [`LoadBalancerClient`] wraps a caller-supplied [`RequestExecutor`] (the
//! transport) with the full dispatch pipeline: pick a server, pass
//! admission, execute, record the outcome on the server's stats, and retry
//! within the configured budget. Hooks bound at construction observe the
//! final outcome of every logical call.
//!
//! Cancellation is structural: dropping the future returned by
//! [`LoadBalancerClient::execute`] abandons the in-flight attempt, and the
//! guards inside release the concurrency slot and the server's active
//! count on the way down. The overall `requestTimeout` deadline is
//! enforced here; per-attempt connect and read timeouts belong to the
//! executor.

pub mod hooks;
pub mod request;
pub mod retry;

pub use hooks::{
    AfterDispatch, AfterFn, BeforeDispatch, BeforeFn, DispatchContext, LogAfterDispatch,
};
pub use request::{is_idempotent, LbRequest, LbResponse};
pub use retry::RetryPolicy;

use crate::balancer::LoadBalancer;
use crate::config::{keys, ClientConfig};
use crate::error::{ClientError, ClientResult, ThrottleKind};
use crate::server::{RequestOutcome, Server};
use crate::BoxFuture;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

/// The transport capability: run one attempt against one server.
///
/// The executor owns connection handling and per-attempt timeouts, honors
/// `ctx.deadline` when it can, and must translate upstream 502/503/504
/// responses into [`ClientError::Throttled`] with [`ThrottleKind::Server`]
/// (see [`ClientError::from_upstream_status`]) so the retry handler treats
/// them as next-server retryable.
pub trait RequestExecutor<Q, S>: Send + Sync {
    /// Execute `request` against `server`.
    fn execute<'a>(
        &'a self,
        server: &'a Server,
        request: &'a Q,
        ctx: &'a DispatchContext,
    ) -> BoxFuture<'a, ClientResult<S>>;
}

/// Adapter turning a closure into a [`RequestExecutor`].
pub struct ExecutorFn<F>(pub F);

impl<Q, S, F> RequestExecutor<Q, S> for ExecutorFn<F>
where
    F: for<'a> Fn(&'a Server, &'a Q, &'a DispatchContext) -> BoxFuture<'a, ClientResult<S>>
        + Send
        + Sync,
{
    fn execute<'a>(
        &'a self,
        server: &'a Server,
        request: &'a Q,
        ctx: &'a DispatchContext,
    ) -> BoxFuture<'a, ClientResult<S>> {
        (self.0)(server, request, ctx)
    }
}

/// A client that dispatches requests through a [`LoadBalancer`].
pub struct LoadBalancerClient<Q, S> {
    name: String,
    lb: Arc<LoadBalancer>,
    executor: Arc<dyn RequestExecutor<Q, S>>,
    before: Vec<Box<dyn BeforeDispatch<Q>>>,
    after: Vec<Box<dyn AfterDispatch<Q, S>>>,
    retry: RetryPolicy,
    request_timeout: Duration,
    default_lb_key: Option<String>,
}

impl<Q, S> std::fmt::Debug for LoadBalancerClient<Q, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadBalancerClient")
            .field("name", &self.name)
            .field("retry", &self.retry)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl<Q, S> LoadBalancerClient<Q, S> {
    /// Start building a client over `lb`.
    #[must_use]
    pub fn builder(config: &ClientConfig, lb: Arc<LoadBalancer>) -> ClientBuilder<Q, S> {
        ClientBuilder::new(config, lb)
    }

    /// The logical client name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The balancer this client dispatches through.
    #[must_use]
    pub fn load_balancer(&self) -> &Arc<LoadBalancer> {
        &self.lb
    }
}

impl<Q: LbRequest, S> LoadBalancerClient<Q, S> {
    /// Dispatch with the client's own configuration.
    pub async fn execute(&self, request: &Q) -> ClientResult<S> {
        self.execute_with(request, None).await
    }

    /// Dispatch with a per-request configuration overlaying the client's.
    pub async fn execute_with(
        &self,
        request: &Q,
        overlay: Option<&ClientConfig>,
    ) -> ClientResult<S> {
        let policy = overlay.map_or_else(|| self.retry.clone(), RetryPolicy::from_config);
        let total_timeout = overlay.map_or(self.request_timeout, |cfg| {
            cfg.get_duration(keys::REQUEST_TIMEOUT, self.request_timeout)
        });
        let deadline = (!total_timeout.is_zero()).then(|| Instant::now() + total_timeout);

        let mut ctx = DispatchContext::new(self.name.clone(), deadline);
        for hook in &self.before {
            hook.call(&ctx, request);
        }

        let result = self.dispatch(request, &policy, &mut ctx).await;

        for hook in &self.after {
            hook.call(&ctx, request, result.as_ref().ok(), result.as_ref().err());
        }
        result
    }

    async fn dispatch(
        &self,
        request: &Q,
        policy: &RetryPolicy,
        ctx: &mut DispatchContext,
    ) -> ClientResult<S> {
        let mut same_tried = 0u32;
        let mut next_tried = 0u32;
        let mut last_err: Option<ClientError> = None;
        let idempotent = policy.retry_on_all_operations || is_idempotent(&request.method());
        let deadline = ctx.deadline;

        loop {
            if let Some(d) = deadline {
                if Instant::now() >= d {
                    return Err(ClientError::DeadlineExceeded);
                }
            }

            let key = request.lb_key().or(self.default_lb_key.as_deref());
            let Some(server) = self.lb.choose_server(key) else {
                return Err(ClientError::NoAvailableServer {
                    client: self.name.clone(),
                    last: last_err.take().map(Box::new),
                });
            };

            let permit = match self.lb.admission().try_admit() {
                Ok(permit) => permit,
                Err(kind) => return Err(ClientError::Throttled(kind)),
            };

            let stats = self.lb.server_stats(&server);
            let started = Instant::now();
            let in_flight = stats.start_request(started);
            ctx.server = Some(server.clone());
            ctx.attempts += 1;

            let attempt = self.executor.execute(&server, request, &*ctx);
            let outcome = match deadline {
                Some(d) => {
                    let remaining = d.saturating_duration_since(started);
                    match timeout(remaining, attempt).await {
                        Ok(result) => result,
                        // The attempt overran the overall deadline: the
                        // guards drop here, releasing the slot and the
                        // active count without recording a completion.
                        Err(_) => return Err(ClientError::DeadlineExceeded),
                    }
                }
                None => attempt.await,
            };
            let finished = Instant::now();

            match outcome {
                Ok(response) => {
                    in_flight.complete(finished, RequestOutcome::Success);
                    drop(permit);
                    return Ok(response);
                }
                Err(err) => {
                    match classify(&err) {
                        Some(class) => in_flight.complete(finished, class),
                        None => drop(in_flight),
                    }
                    drop(permit);

                    if err.is_connection_failure() {
                        let circuit = self.lb.circuit_config();
                        if stats.should_trip(circuit) {
                            stats.trip_circuit(finished, circuit);
                            warn!(
                                client = %self.name,
                                server = %server.id(),
                                failures = stats.successive_connection_failures(),
                                "circuit tripped"
                            );
                        }
                    }

                    let retryable = err.is_retryable(idempotent);
                    debug!(
                        client = %self.name,
                        server = %server.id(),
                        attempt = ctx.attempts,
                        retryable,
                        error = %err,
                        "attempt failed"
                    );
                    last_err = Some(err);

                    if retryable {
                        if same_tried < policy.max_same_server {
                            same_tried += 1;
                            continue;
                        }
                        if next_tried < policy.max_next_server {
                            next_tried += 1;
                            same_tried = 0;
                            continue;
                        }
                    }
                    return Err(last_err.take().expect("error stored above"));
                }
            }
        }
    }
}

/// How a failed attempt lands on the server's statistics. `None` means the
/// failure is not attributable to the server at all; only the active count
/// is released.
fn classify(err: &ClientError) -> Option<RequestOutcome> {
    if err.is_connection_failure() {
        return Some(RequestOutcome::ConnectionFailure);
    }
    match err {
        ClientError::Throttled(ThrottleKind::Server) => Some(RequestOutcome::Failure),
        // The server answered; its health is fine.
        ClientError::Application { .. } => Some(RequestOutcome::Success),
        _ => None,
    }
}

/// Builder for [`LoadBalancerClient`]. Hooks land here and are frozen at
/// [`ClientBuilder::build`].
pub struct ClientBuilder<Q, S> {
    name: String,
    lb: Arc<LoadBalancer>,
    executor: Option<Arc<dyn RequestExecutor<Q, S>>>,
    before: Vec<Box<dyn BeforeDispatch<Q>>>,
    after: Vec<Box<dyn AfterDispatch<Q, S>>>,
    retry: RetryPolicy,
    request_timeout: Duration,
    default_lb_key: Option<String>,
}

impl<Q, S> ClientBuilder<Q, S> {
    fn new(config: &ClientConfig, lb: Arc<LoadBalancer>) -> Self {
        let default_lb_key =
            config.get_string(keys::LOAD_BALANCER_KEY, keys::DEFAULT_LOAD_BALANCER_KEY);
        Self {
            name: config.client_name().to_string(),
            lb,
            executor: None,
            before: Vec::new(),
            after: Vec::new(),
            retry: RetryPolicy::from_config(config),
            request_timeout: config
                .get_duration(keys::REQUEST_TIMEOUT, keys::DEFAULT_REQUEST_TIMEOUT),
            default_lb_key: (!default_lb_key.is_empty()).then_some(default_lb_key),
        }
    }

    /// Supply the transport. Required.
    #[must_use]
    pub fn executor(mut self, executor: Arc<dyn RequestExecutor<Q, S>>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Append a before-dispatch hook.
    #[must_use]
    pub fn before_hook(mut self, hook: impl BeforeDispatch<Q> + 'static) -> Self {
        self.before.push(Box::new(hook));
        self
    }

    /// Append an after-dispatch hook.
    #[must_use]
    pub fn after_hook(mut self, hook: impl AfterDispatch<Q, S> + 'static) -> Self {
        self.after.push(Box::new(hook));
        self
    }

    /// Freeze the hook chain and build the client.
    pub fn build(self) -> ClientResult<LoadBalancerClient<Q, S>> {
        let executor = self
            .executor
            .ok_or_else(|| ClientError::General("client built without an executor".to_string()))?;
        Ok(LoadBalancerClient {
            name: self.name,
            lb: self.lb,
            executor,
            before: self.before,
            after: self.after,
            retry: self.retry,
            request_timeout: self.request_timeout,
            default_lb_key: self.default_lb_key,
        })
    }
}

impl<Q: LbRequest + 'static, S: LbResponse + 'static> ClientBuilder<Q, S> {
    /// Append the stock structured-log after-hook.
    #[must_use]
    pub fn with_default_log_hook(self) -> Self {
        self.after_hook(LogAfterDispatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;

    struct NeverCalled;

    impl RequestExecutor<http::Request<()>, http::Response<()>> for NeverCalled {
        fn execute<'a>(
            &'a self,
            _server: &'a Server,
            _request: &'a http::Request<()>,
            _ctx: &'a DispatchContext,
        ) -> BoxFuture<'a, ClientResult<http::Response<()>>> {
            Box::pin(async { panic!("executor must not run") })
        }
    }

    #[tokio::test]
    async fn test_builder_requires_executor() {
        let cfg = ClientConfig::with_defaults("orders");
        let lb = LoadBalancer::builder(&cfg)
            .without_background_tasks()
            .build()
            .await;

        let result: ClientResult<LoadBalancerClient<http::Request<()>, http::Response<()>>> =
            LoadBalancerClient::builder(&cfg, lb).build();
        assert!(matches!(result, Err(ClientError::General(_))));
    }

    #[tokio::test]
    async fn test_empty_pool_short_circuits_before_executor() {
        let cfg = ClientConfig::with_defaults("orders");
        let lb = LoadBalancer::builder(&cfg)
            .without_background_tasks()
            .build()
            .await;
        let client: LoadBalancerClient<http::Request<()>, http::Response<()>> =
            LoadBalancerClient::builder(&cfg, lb)
                .executor(Arc::new(NeverCalled))
                .with_default_log_hook()
                .build()
                .unwrap();

        let request = http::Request::builder()
            .uri("http://placeholder/")
            .body(())
            .unwrap();
        let err = client.execute(&request).await.unwrap_err();
        assert!(matches!(err, ClientError::NoAvailableServer { last: None, .. }));
    }

    #[test]
    fn test_classification() {
        assert_eq!(
            classify(&ClientError::ConnectFailure {
                server: "a:80".to_string(),
                detail: "refused".to_string(),
            }),
            Some(RequestOutcome::ConnectionFailure)
        );
        assert_eq!(
            classify(&ClientError::Throttled(ThrottleKind::Server)),
            Some(RequestOutcome::Failure)
        );
        assert_eq!(
            classify(&ClientError::Application { status: 404 }),
            Some(RequestOutcome::Success)
        );
        assert_eq!(classify(&ClientError::Cancelled), None);
        assert_eq!(
            classify(&ClientError::Throttled(ThrottleKind::TokenBucket)),
            None
        );
    }
}
