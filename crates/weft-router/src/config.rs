//! TOML configuration for a border router instance.
//!
//! The topology/config loader is an external collaborator; this module is
//! only its boundary: bound local addresses, external-link definitions, and
//! the handful of knobs the forwarding core needs.

use std::net::SocketAddr;
use std::path::Path;

use serde::Deserialize;

use weft_io::Overlay;

use crate::error::SetupError;

/// Top-level router configuration loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct RouterConfig {
    #[serde(default)]
    pub router: RouterSection,
    /// Bound local addresses, indexed by position.
    #[serde(default)]
    pub local: Vec<LocalAddrSection>,
    /// External links to neighbouring routers.
    #[serde(default)]
    pub links: Vec<LinkSection>,
}

impl RouterConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, SetupError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SetupError::Config(format!("failed to read config file: {e}")))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, SetupError> {
        toml::from_str(s).map_err(|e| SetupError::Config(format!("failed to parse config: {e}")))
    }
}

/// The `[router]` section.
#[derive(Debug, Deserialize)]
pub struct RouterSection {
    #[serde(default = "default_id")]
    pub id: String,
    /// AES-128 forwarding key shared by the routers of this AS, hex encoded.
    pub mac_key: Option<String>,
    /// Alternate network backends to try before the POSIX default, in order.
    #[serde(default)]
    pub backends: Vec<String>,
    /// Capacity of each bounded ingress/egress queue.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
    /// Buffers retained by the packet pool.
    #[serde(default = "default_pool_capacity")]
    pub pool_capacity: usize,
}

fn default_id() -> String {
    "br".to_string()
}

fn default_queue_depth() -> usize {
    32
}

fn default_pool_capacity() -> usize {
    1024
}

impl Default for RouterSection {
    fn default() -> Self {
        Self {
            id: default_id(),
            mac_key: None,
            backends: Vec::new(),
            queue_depth: default_queue_depth(),
            pool_capacity: default_pool_capacity(),
        }
    }
}

/// A `[[local]]` entry: one bound local address.
#[derive(Debug, Clone, Deserialize)]
pub struct LocalAddrSection {
    /// Address neighbours and endhosts send to.
    pub public: SocketAddr,
    /// Distinct bind address for NAT/asymmetric deployments.
    pub bind: Option<SocketAddr>,
}

impl LocalAddrSection {
    pub fn overlay(&self) -> Overlay {
        Overlay::new(self.public.ip(), self.public.port())
            .with_bind(self.bind.map(|a| a.ip()), self.bind.map(|a| a.port()))
    }
}

/// A `[[links]]` entry: one external link to a neighbouring router.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkSection {
    pub id: u16,
    /// Index into `local` of the address this link is associated with.
    #[serde(default)]
    pub local_index: usize,
    pub public: SocketAddr,
    pub bind: Option<SocketAddr>,
    /// The neighbouring router's overlay address.
    pub remote: SocketAddr,
}

impl LinkSection {
    pub fn overlay(&self) -> Overlay {
        Overlay::new(self.public.ip(), self.public.port())
            .with_bind(self.bind.map(|a| a.ip()), self.bind.map(|a| a.port()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let config = RouterConfig::parse(
            r#"
            [router]
            id = "br1-ff00"
            mac_key = "000102030405060708090a0b0c0d0e0f"
            queue_depth = 64

            [[local]]
            public = "192.0.2.1:30041"

            [[local]]
            public = "192.0.2.2:30041"
            bind = "10.0.0.2:30041"

            [[links]]
            id = 5
            local_index = 1
            public = "198.51.100.1:50000"
            remote = "198.51.100.2:50000"
            "#,
        )
        .unwrap();

        assert_eq!(config.router.id, "br1-ff00");
        assert_eq!(config.router.queue_depth, 64);
        assert_eq!(config.router.pool_capacity, 1024);
        assert_eq!(config.local.len(), 2);
        assert_eq!(config.local[1].bind, Some("10.0.0.2:30041".parse().unwrap()));
        assert_eq!(config.links.len(), 1);
        assert_eq!(config.links[0].id, 5);
        assert_eq!(config.links[0].local_index, 1);
    }

    #[test]
    fn defaults_apply() {
        let config = RouterConfig::parse("").unwrap();
        assert_eq!(config.router.id, "br");
        assert!(config.router.mac_key.is_none());
        assert!(config.router.backends.is_empty());
        assert_eq!(config.router.queue_depth, 32);
        assert!(config.local.is_empty());
        assert!(config.links.is_empty());
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = RouterConfig::parse("[[local]]\npublic = \"not an addr\"").unwrap_err();
        assert!(matches!(err, SetupError::Config(_)));
    }

    #[test]
    fn overlay_from_sections() {
        let local = LocalAddrSection {
            public: "192.0.2.1:30041".parse().unwrap(),
            bind: None,
        };
        assert_eq!(local.overlay().bind_addr(), local.public);

        let link = LinkSection {
            id: 1,
            local_index: 0,
            public: "192.0.2.1:50000".parse().unwrap(),
            bind: Some("10.0.0.1:50001".parse().unwrap()),
            remote: "192.0.2.9:50000".parse().unwrap(),
        };
        assert_eq!(
            link.overlay().bind_addr(),
            "10.0.0.1:50001".parse().unwrap()
        );
    }
}
