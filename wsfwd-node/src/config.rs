//! Bridge configuration: controller endpoint, credentials and host tunables

use std::fmt;
use std::path::Path;

const DEFAULT_NODE_ID: &str = "esp32-ble-bridge";
const DEFAULT_DEVICE_NAME: &str = "collar";
const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 5000;
const DEFAULT_POLL_INTERVAL_MS: u64 = 10;

/// Setup-time failures. Any of these stops the bridge before it runs.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid server URL {0:?}: missing port")]
    MissingPort(String),
    #[error("invalid server URL {0:?}: missing path")]
    MissingPath(String),
    #[error("invalid server URL {0:?}: path before port")]
    PathBeforePort(String),
    #[error("invalid server URL {0:?}: empty host")]
    EmptyHost(String),
    #[error("invalid server URL {url:?}: bad port {port:?}")]
    InvalidPort { url: String, port: String },
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Controller endpoint, resolved once from `scheme://host:port/path`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl Endpoint {
    /// Parse a server URL. The scheme is optional and defaults to `ws`.
    pub fn parse(url: &str) -> Result<Self, ConfigError> {
        let (scheme, rest) = match url.find("://") {
            Some(i) => (&url[..i], &url[i + 3..]),
            None => ("ws", url),
        };

        let port_start = rest.find(':').ok_or_else(|| ConfigError::MissingPort(url.to_string()))?;
        let path_start = rest.find('/').ok_or_else(|| ConfigError::MissingPath(url.to_string()))?;
        if path_start < port_start {
            return Err(ConfigError::PathBeforePort(url.to_string()));
        }

        let host = &rest[..port_start];
        if host.is_empty() {
            return Err(ConfigError::EmptyHost(url.to_string()));
        }

        let port_str = &rest[port_start + 1..path_start];
        let port = match port_str.parse::<u16>() {
            Ok(port) if port != 0 => port,
            _ => {
                return Err(ConfigError::InvalidPort {
                    url: url.to_string(),
                    port: port_str.to_string(),
                })
            }
        };

        Ok(Self {
            scheme: if scheme.is_empty() { "ws".to_string() } else { scheme.to_string() },
            host: host.to_string(),
            port,
            path: rest[path_start..].to_string(),
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}{}", self.scheme, self.host, self.port, self.path)
    }
}

/// Token and node id sent in the `auth` message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
    pub node_id: String,
}

/// Bridge configuration as stored on disk
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BridgeConfig {
    /// Controller URL, e.g. `ws://10.0.0.2:8080/ws/node`
    pub server_url: String,
    pub token: String,
    #[serde(default = "default_node_id")]
    pub node_id: String,
    /// Substring matched against the peripheral's advertised name
    #[serde(default = "default_device_name")]
    pub device_name: String,
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            token: String::new(),
            node_id: default_node_id(),
            device_name: default_device_name(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl BridgeConfig {
    /// Load a JSON config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn endpoint(&self) -> Result<Endpoint, ConfigError> {
        Endpoint::parse(&self.server_url)
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            token: self.token.clone(),
            node_id: self.node_id.clone(),
        }
    }
}

fn default_node_id() -> String {
    DEFAULT_NODE_ID.to_string()
}

fn default_device_name() -> String {
    DEFAULT_DEVICE_NAME.to_string()
}

fn default_reconnect_interval_ms() -> u64 {
    DEFAULT_RECONNECT_INTERVAL_MS
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}
