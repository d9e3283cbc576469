//! # Client configuration
//!
//! A layered, string-keyed store of typed configuration values.
//!
//! Two layers exist: *external* properties supplied by the embedding
//! application (typically parsed from a TOML document) and *internal*
//! properties resolved during [`ClientConfig::load`]. Loading installs every
//! known default, lets a bare external key override it, then copies
//! `clientName.`-prefixed external keys (prefix stripped) over the result.
//! Reads always hit the internal layer; typed getters coerce and fall back
//! to the caller-supplied default when coercion fails.
//!
//! ```
//! use rudder::config::{keys, ClientConfig, Properties};
//!
//! let mut external = Properties::new();
//! external.set("orders.maxAutoRetries", 2i64);
//!
//! let mut cfg = ClientConfig::new("orders", external);
//! cfg.set(keys::MAX_TOTAL_CONNECTIONS, 500i64)
//!     .set(keys::LOAD_BALANCER_RULE, "Random");
//!
//! assert_eq!(cfg.get_int(keys::MAX_AUTO_RETRIES, 0), 2);
//! assert_eq!(cfg.get_int(keys::MAX_TOTAL_CONNECTIONS, 0), 500);
//! ```

pub mod error;
pub mod keys;
pub mod properties;
pub mod store;

pub use error::ConfigError;
pub use properties::{Properties, PropertyValue};
pub use store::ClientConfig;
