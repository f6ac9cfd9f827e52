//! Control server configuration types and defaults.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// Configuration for the control server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    /// The socket address to bind the server to
    pub bind_address: SocketAddr,

    /// Directory holding `serverGroups.json` and `proxyGroups.json`
    pub data_directory: PathBuf,

    /// Maximum number of concurrent control connections
    pub max_connections: usize,

    /// Idle connection timeout in seconds (0 disables it)
    pub connection_timeout: u64,

    /// Inbound message limits
    pub security: SecurityConfig,
}

/// Limits applied to every inbound message before it is decoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Maximum message size in bytes
    pub max_message_size: usize,

    /// Maximum allowed nesting depth for JSON messages
    pub max_json_depth: usize,

    /// Maximum allowed string length in JSON
    pub max_string_length: usize,

    /// Maximum allowed array/object size
    pub max_collection_size: usize,

    /// Addresses whose connections are refused outright
    pub banned_ips: Vec<IpAddr>,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 5123)),
            data_directory: PathBuf::from("data"),
            max_connections: 256,
            connection_timeout: 300,
            security: SecurityConfig::default(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_message_size: 64 * 1024, // 64KB
            max_json_depth: 8,
            max_string_length: 4096,
            max_collection_size: 256,
            banned_ips: Vec::new(),
        }
    }
}
