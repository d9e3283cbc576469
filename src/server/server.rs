//! Server endpoint identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use tracing::warn;

/// URL scheme a server is reached over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    /// Plain HTTP.
    #[default]
    Http,
    /// TLS.
    Https,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => f.write_str("http"),
            Self::Https => f.write_str("https"),
        }
    }
}

/// One candidate endpoint.
///
/// Equality and hashing go by [`Server::id`] alone, which defaults to
/// `host:port`. Two `Server` values with the same id are the same server
/// regardless of zone or scheme.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    scheme: Scheme,
    host: String,
    port: u16,
    zone: Option<String>,
    id: String,
}

impl Server {
    /// Create a server with the default scheme and an id of `host:port`.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        let id = format!("{host}:{port}");
        Self {
            scheme: Scheme::default(),
            host,
            port,
            zone: None,
            id,
        }
    }

    /// Replace the scheme.
    #[must_use]
    pub fn with_scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Attach a zone label.
    #[must_use]
    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self
    }

    /// Override the identity.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Parse a single `host:port` (or bare `host`) entry.
    #[must_use]
    pub fn parse(entry: &str, default_port: u16) -> Option<Self> {
        let entry = entry.trim();
        if entry.is_empty() {
            return None;
        }
        match entry.rsplit_once(':') {
            Some((host, port)) => {
                let host = host.trim();
                if host.is_empty() {
                    return None;
                }
                let port: u16 = port.trim().parse().ok()?;
                Some(Self::new(host, port))
            }
            None => Some(Self::new(entry, default_port)),
        }
    }

    /// Parse a comma-separated server list. Entries that do not parse are
    /// skipped with a warning.
    #[must_use]
    pub fn parse_list(list: &str, default_port: u16) -> Vec<Self> {
        list.split(',')
            .filter(|e| !e.trim().is_empty())
            .filter_map(|entry| {
                let server = Self::parse(entry, default_port);
                if server.is_none() {
                    warn!(entry, "skipping unparseable server list entry");
                }
                server
            })
            .collect()
    }

    /// The scheme.
    #[must_use]
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// The host name or address.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The zone label, when the list source supplied one.
    #[must_use]
    pub fn zone(&self) -> Option<&str> {
        self.zone.as_deref()
    }

    /// The identity key.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// `host:port` rendering, independent of the id override.
    #[must_use]
    pub fn host_port(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl PartialEq for Server {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Server {}

impl Hash for Server {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_id_defaults_to_host_port() {
        let server = Server::new("api1", 8080);
        assert_eq!(server.id(), "api1:8080");
        assert_eq!(server.host_port(), "api1:8080");
    }

    #[test]
    fn test_equality_by_id_only() {
        let a = Server::new("api1", 8080).with_zone("us-east-1a");
        let b = Server::new("api1", 8080).with_zone("us-east-1b");
        assert_eq!(a, b);

        let c = Server::new("api1", 8080).with_id("replica-1");
        assert_ne!(a, c);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_parse_entry() {
        let server = Server::parse("api1:9090", 80).unwrap();
        assert_eq!(server.host(), "api1");
        assert_eq!(server.port(), 9090);

        let bare = Server::parse("api2", 80).unwrap();
        assert_eq!(bare.port(), 80);

        assert!(Server::parse("", 80).is_none());
        assert!(Server::parse("api1:notaport", 80).is_none());
        assert!(Server::parse(":8080", 80).is_none());
    }

    #[test]
    fn test_parse_list_skips_bad_entries() {
        let servers = Server::parse_list("a:80, b:81 ,bad:port,, c", 9000);
        let ids: Vec<&str> = servers.iter().map(Server::id).collect();
        assert_eq!(ids, vec!["a:80", "b:81", "c:9000"]);
    }

    #[test]
    fn test_display() {
        let server = Server::new("api1", 443).with_scheme(Scheme::Https);
        assert_eq!(server.to_string(), "https://api1:443");
    }
}
