//! # Servers and their rolling statistics
//!
//! A [`Server`] is an immutable endpoint identity. Its mutable companion,
//! [`ServerStats`], accumulates what the dispatch path observes: in-flight
//! and total request counts, a sliding window of completions, a response
//! time reservoir, and the circuit breaker state derived from successive
//! connection failures.
//!
//! All counter updates are atomic and non-blocking; only the response time
//! reservoir takes a lock, and only on its own samples.

pub mod distribution;
pub mod server;
pub mod stats;
pub mod window;

pub use distribution::{DistributionSummary, ResponseTimeDistribution};
pub use server::{Scheme, Server};
pub use stats::{CircuitBreakerConfig, InFlight, RequestOutcome, ServerStats};
pub use window::RequestCountWindow;
