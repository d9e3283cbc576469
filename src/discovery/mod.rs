//! # Server list sources and liveness probing
//!
//! The candidate pool comes from a pluggable [`ServerListSource`]; a
//! background poller refreshes it on a fixed interval and swaps the
//! balancer's list atomically. A separate [`Ping`] capability probes each
//! known server on its own clock and maintains the up/down view. Neither
//! task ever blocks dispatch, and a cycle that overruns its period is
//! skipped rather than queued.

pub mod ping;
pub mod source;
pub mod tasks;

pub use ping::{NoopPing, Ping, PingStrategy, TcpPing};
pub use source::{ProviderServerList, ServerListSource, StaticServerList};

use thiserror::Error;

/// Errors raised by server list sources.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The source failed to produce a list.
    #[error("server list source failed: {0}")]
    Source(String),
}
