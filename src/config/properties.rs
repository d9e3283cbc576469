//! Typed property values and the flat key/value bag they live in.

use super::error::{ConfigError, ConfigResult};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// A single typed configuration value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Free-form string.
    Str(String),
    /// Time span.
    Duration(Duration),
}

impl PropertyValue {
    /// Coerce to a boolean. Strings parse as `true`/`false`.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Coerce to an integer. Strings parse; floats truncate.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Float(f) => Some(*f as i64),
            Self::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Coerce to a float. Integers widen; strings parse.
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            Self::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Coerce to a duration. Strings parse with humantime (`"2s"`, `"100ms"`).
    #[must_use]
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Self::Duration(d) => Some(*d),
            Self::Str(s) => humantime::parse_duration(s.trim()).ok(),
            _ => None,
        }
    }

    /// String rendering of any value.
    #[must_use]
    pub fn as_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => f.write_str(s),
            Self::Duration(d) => write!(f, "{}", humantime::format_duration(*d)),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<Duration> for PropertyValue {
    fn from(v: Duration) -> Self {
        Self::Duration(v)
    }
}

/// A flat bag of dotted keys to typed values.
#[derive(Debug, Clone, Default)]
pub struct Properties {
    values: HashMap<String, PropertyValue>,
}

impl Properties {
    /// Create an empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document into a flat bag. Nested tables flatten into
    /// dotted keys, so `[orders] maxAutoRetries = 2` becomes
    /// `orders.maxAutoRetries`. Arrays of scalars join with commas.
    pub fn from_toml_str(input: &str) -> ConfigResult<Self> {
        let table: toml::Table = input.parse()?;
        let mut props = Self::new();
        flatten_table(&mut props, "", &table)?;
        Ok(props)
    }

    /// Store a value under `key`, replacing any previous one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Look up a value by exact key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.values.get(key)
    }

    /// Whether a key is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Number of stored properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the bag is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over entries whose key starts with `prefix`, yielding the key
    /// with the prefix stripped.
    pub fn with_prefix_stripped<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a PropertyValue)> + 'a {
        self.values
            .iter()
            .filter_map(move |(k, v)| k.strip_prefix(prefix).map(|rest| (rest, v)))
    }

    /// Iterate over all entries.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &PropertyValue)> {
        self.values.iter()
    }
}

fn flatten_table(props: &mut Properties, prefix: &str, table: &toml::Table) -> ConfigResult<()> {
    for (name, value) in table {
        let key = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}.{name}")
        };
        match value {
            toml::Value::String(s) => {
                props.set(key, s.as_str());
            }
            toml::Value::Integer(i) => {
                props.set(key, *i);
            }
            toml::Value::Float(f) => {
                props.set(key, *f);
            }
            toml::Value::Boolean(b) => {
                props.set(key, *b);
            }
            toml::Value::Datetime(dt) => {
                props.set(key, dt.to_string());
            }
            toml::Value::Array(items) => {
                let mut parts = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        toml::Value::String(s) => parts.push(s.clone()),
                        toml::Value::Integer(i) => parts.push(i.to_string()),
                        toml::Value::Float(f) => parts.push(f.to_string()),
                        toml::Value::Boolean(b) => parts.push(b.to_string()),
                        _ => return Err(ConfigError::Unsupported { key }),
                    }
                }
                props.set(key, parts.join(","));
            }
            toml::Value::Table(inner) => flatten_table(props, &key, inner)?,
        }
    }
    Ok(())
}
