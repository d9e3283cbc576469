//! # rudder
//!
//! Client-side load balancing for service-to-service calls: given a
//! logical client name, a pool of candidate servers, and a request, pick a
//! server, pass admission, run the caller's transport, record the outcome,
//! and retry transient failures within a configured budget.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────┐   execute    ┌──────────────────┐
//! │ LoadBalancerClient │─────────────▶│ RequestExecutor  │ (yours)
//! │  retry state machine│              └──────────────────┘
//! └───────┬────────────┘
//!         │ choose / admit / record
//! ┌───────▼────────────┐   refresh    ┌──────────────────┐
//! │    LoadBalancer    │◀─────────────│ ServerListSource │ (yours)
//! │ rule · stats · gate│   is_alive   │       Ping       │ (yours)
//! └────────────────────┘◀─────────────└──────────────────┘
//! ```
//!
//! The transport, list source, ping, and rule are capabilities; built-in
//! implementations cover the common cases (static lists, TCP probes, round
//! robin and friends) and anything can be swapped at the builder.
//!
//! ## Example
//!
//! ```no_run
//! use rudder::client::{DispatchContext, LoadBalancerClient, RequestExecutor};
//! use rudder::config::{keys, ClientConfig};
//! use rudder::balancer::LoadBalancer;
//! use rudder::error::ClientResult;
//! use rudder::server::Server;
//! use rudder::BoxFuture;
//! use std::sync::Arc;
//!
//! struct MyTransport;
//!
//! impl RequestExecutor<http::Request<Vec<u8>>, http::Response<Vec<u8>>> for MyTransport {
//!     fn execute<'a>(
//!         &'a self,
//!         server: &'a Server,
//!         request: &'a http::Request<Vec<u8>>,
//!         _ctx: &'a DispatchContext,
//!     ) -> BoxFuture<'a, ClientResult<http::Response<Vec<u8>>>> {
//!         Box::pin(async move {
//!             // Connect to server.host_port(), send, translate 502/503/504
//!             // via ClientError::from_upstream_status, return the rest.
//!             todo!()
//!         })
//!     }
//! }
//!
//! # async fn run() -> ClientResult<()> {
//! let mut cfg = ClientConfig::with_defaults("orders");
//! cfg.set(keys::LIST_OF_SERVERS, "10.0.0.1:8080,10.0.0.2:8080");
//!
//! let lb = LoadBalancer::builder(&cfg).build().await;
//! let client = LoadBalancerClient::builder(&cfg, lb)
//!     .executor(Arc::new(MyTransport))
//!     .with_default_log_hook()
//!     .build()?;
//!
//! let request = http::Request::builder()
//!     .uri("http://orders/v1/list")
//!     .body(Vec::new())
//!     .unwrap();
//! let _response = client.execute(&request).await?;
//! # Ok(())
//! # }
//! ```

pub mod balancer;
pub mod client;
pub mod config;
pub mod discovery;
pub mod error;
pub mod rate_limit;
pub mod rule;
pub mod server;

pub use balancer::LoadBalancer;
pub use client::{LoadBalancerClient, RequestExecutor};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult, ThrottleKind};
pub use server::Server;

use std::future::Future;
use std::pin::Pin;

/// Boxed future alias used by the capability traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
