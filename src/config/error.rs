//! Configuration error types.

use thiserror::Error;

/// Errors raised while loading external properties.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The TOML document failed to parse.
    #[error("failed to parse properties: {0}")]
    Toml(#[from] toml::de::Error),

    /// A value could not be represented as a property.
    #[error("unsupported value at key '{key}'")]
    Unsupported {
        /// Dotted key path of the offending value.
        key: String,
    },
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
