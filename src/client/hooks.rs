//! Dispatch hooks.
//!
//! Hooks are bound at client construction and never change afterwards, so
//! concurrent dispatch never races registration. Before-hooks run once per
//! logical call, after-hooks observe the final outcome only — retries in
//! between are invisible to them.

use super::request::{LbRequest, LbResponse};
use crate::error::ClientError;
use crate::server::Server;
use std::time::Instant;
use tracing::{info, warn};

/// Per-call context shared with the executor and the hooks.
#[derive(Debug, Clone)]
pub struct DispatchContext {
    /// Logical client name.
    pub client: String,
    /// Server of the most recent attempt, once one was made.
    pub server: Option<Server>,
    /// Overall deadline for the call, when one is configured.
    pub deadline: Option<Instant>,
    /// Attempts made so far, including the first.
    pub attempts: u32,
}

impl DispatchContext {
    pub(crate) fn new(client: String, deadline: Option<Instant>) -> Self {
        Self {
            client,
            server: None,
            deadline,
            attempts: 0,
        }
    }
}

/// Invoked once before the first dispatch attempt.
pub trait BeforeDispatch<Q>: Send + Sync {
    /// Observe the outgoing request.
    fn call(&self, ctx: &DispatchContext, request: &Q);
}

/// Invoked once with the final outcome.
pub trait AfterDispatch<Q, S>: Send + Sync {
    /// Observe the final response or error.
    fn call(
        &self,
        ctx: &DispatchContext,
        request: &Q,
        response: Option<&S>,
        error: Option<&ClientError>,
    );
}

/// Adapter turning a closure into a [`BeforeDispatch`] hook.
pub struct BeforeFn<F>(pub F);

impl<Q, F> BeforeDispatch<Q> for BeforeFn<F>
where
    F: Fn(&DispatchContext, &Q) + Send + Sync,
{
    fn call(&self, ctx: &DispatchContext, request: &Q) {
        (self.0)(ctx, request);
    }
}

/// Adapter turning a closure into an [`AfterDispatch`] hook.
pub struct AfterFn<F>(pub F);

impl<Q, S, F> AfterDispatch<Q, S> for AfterFn<F>
where
    F: Fn(&DispatchContext, &Q, Option<&S>, Option<&ClientError>) + Send + Sync,
{
    fn call(
        &self,
        ctx: &DispatchContext,
        request: &Q,
        response: Option<&S>,
        error: Option<&ClientError>,
    ) {
        (self.0)(ctx, request, response, error);
    }
}

/// The stock after-hook: one structured log line per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAfterDispatch;

impl<Q: LbRequest, S: LbResponse> AfterDispatch<Q, S> for LogAfterDispatch {
    fn call(
        &self,
        ctx: &DispatchContext,
        request: &Q,
        response: Option<&S>,
        error: Option<&ClientError>,
    ) {
        let uri = request.uri();
        let host = ctx
            .server
            .as_ref()
            .map_or_else(|| uri.host().unwrap_or("").to_string(), Server::host_port);
        let args = uri.query().unwrap_or("");

        match (response, error) {
            (_, Some(err)) => warn!(
                client = %ctx.client,
                method = %request.method(),
                host = %host,
                uri = %uri.path(),
                args = %args,
                attempts = ctx.attempts,
                status_code = 0_u16,
                err = %err,
                "request failed"
            ),
            (Some(resp), None) => info!(
                client = %ctx.client,
                method = %request.method(),
                host = %host,
                uri = %uri.path(),
                args = %args,
                attempts = ctx.attempts,
                status_code = resp.status().as_u16(),
                "request complete"
            ),
            (None, None) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_closure_adapters_satisfy_traits() {
        let before_calls = Arc::new(AtomicU32::new(0));
        let counted = Arc::clone(&before_calls);
        let before = BeforeFn(move |_: &DispatchContext, _: &String| {
            counted.fetch_add(1, Ordering::Relaxed);
        });

        let ctx = DispatchContext::new("orders".to_string(), None);
        before.call(&ctx, &"payload".to_string());
        assert_eq!(before_calls.load(Ordering::Relaxed), 1);

        let after = AfterFn(
            |_: &DispatchContext,
             _: &String,
             response: Option<&StatusCode>,
             error: Option<&ClientError>| {
                assert!(response.is_none());
                assert!(error.is_some());
            },
        );
        after.call(
            &ctx,
            &"payload".to_string(),
            None,
            Some(&ClientError::Cancelled),
        );
    }

    #[test]
    fn test_log_hook_handles_both_outcomes() {
        let ctx = DispatchContext::new("orders".to_string(), None);
        let request = http::Request::builder()
            .uri("http://placeholder/health?deep=true")
            .body(())
            .unwrap();
        let response = http::Response::builder()
            .status(StatusCode::OK)
            .body(())
            .unwrap();

        // Both paths just have to not panic; output goes to tracing.
        LogAfterDispatch.call(&ctx, &request, Some(&response), None);
        LogAfterDispatch.call(&ctx, &request, None::<&http::Response<()>>, Some(&ClientError::Cancelled));
    }
}
