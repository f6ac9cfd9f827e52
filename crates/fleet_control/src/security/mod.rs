//! Input guard for the control channel.
//!
//! Every inbound frame passes through [`InputGuard::inspect`] before the
//! dispatcher sees it. Rejections surface to the client as malformed-request
//! errors (code 13).

use crate::config::SecurityConfig;
use crate::error::RequestError;
use serde_json::Value;
use std::net::IpAddr;

pub mod input_validation;

/// Checks inbound connections and messages against the security limits.
#[derive(Debug, Clone, Default)]
pub struct InputGuard {
    config: SecurityConfig,
}

impl InputGuard {
    pub fn new(config: SecurityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SecurityConfig {
        &self.config
    }

    /// Refuses connections from banned addresses.
    pub fn validate_connection(&self, ip: IpAddr) -> Result<(), GuardError> {
        if self.config.banned_ips.contains(&ip) {
            return Err(GuardError::BannedIp(ip));
        }
        Ok(())
    }

    /// Validates a text frame and returns its parsed JSON.
    pub fn inspect(&self, message: &str) -> Result<Value, GuardError> {
        input_validation::validate_json_message(message, &self.config)
    }
}

/// Reasons a connection or message was refused.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GuardError {
    #[error("IP address {0} is banned")]
    BannedIp(IpAddr),

    #[error("Message too large: {0} bytes")]
    MessageTooLarge(usize),

    #[error("Invalid message format: {0}")]
    InvalidMessageFormat(String),

    #[error("Forbidden content detected")]
    ForbiddenContent,
}

impl From<GuardError> for RequestError {
    fn from(error: GuardError) -> Self {
        RequestError::MalformedRequest(error.to_string())
    }
}
