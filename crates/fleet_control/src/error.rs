//! Error types and handling for the fleet control plane.
//!
//! Every failure a request can hit is a [`RequestError`]. Each variant carries a
//! stable numeric code and an ordered list of context arguments so that calling
//! tools can render diagnostics without parsing the message text.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stable numeric error codes.
///
/// Codes are part of the wire contract and must never be renumbered. New
/// errors take [`NEXT_FREE_ERROR_CODE`] and bump it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorCode {
    /// Unexpected failure caught at the dispatch boundary.
    Unknown = 0,
    MissingValue = 1,
    BelowMinimum = 2,
    AboveMaximum = 3,
    OutOfRange = 4,
    MissingField = 5,
    ProxyGroupNotFound = 6,
    ServerGroupNotFound = 7,
    ServerNotFound = 8,
    ProxyNotFound = 9,
    UnknownProxyChooseStrategy = 10,
    InvalidType = 11,
    GroupAlreadyExists = 12,
    MalformedRequest = 13,
}

/// Next code to hand out when a new structured error is added.
pub const NEXT_FREE_ERROR_CODE: u32 = 14;

impl ErrorCode {
    /// Returns the numeric wire value.
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

/// Errors raised while validating or applying a request.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RequestError {
    /// A required value was absent or null
    #[error("{name} must not be null")]
    MissingValue { name: String },

    /// A number was smaller than the allowed floor
    #[error("{name} must not be smaller than {minimum} (actual value: {value})")]
    BelowMinimum {
        name: String,
        value: Value,
        minimum: Value,
    },

    /// A number was greater than the allowed ceiling
    #[error("{name} must not be greater than {maximum} (actual value: {value})")]
    AboveMaximum {
        name: String,
        value: Value,
        maximum: Value,
    },

    /// A number fell outside the allowed interval
    #[error("{name} must be in range [{minimum};{maximum}] (actual value: {value})")]
    OutOfRange {
        name: String,
        value: Value,
        minimum: Value,
        maximum: Value,
    },

    /// The payload did not contain the key at all
    #[error("Missing value for {field}")]
    MissingField { field: String },

    #[error("ProxyGroup '{0}' could not be found")]
    ProxyGroupNotFound(String),

    #[error("ServerGroup '{0}' could not be found")]
    ServerGroupNotFound(String),

    #[error("Server '{0}' could not be found")]
    ServerNotFound(String),

    #[error("Proxy '{0}' could not be found")]
    ProxyNotFound(String),

    #[error("Unknown ProxyChooseStrategy: {0}")]
    UnknownProxyChooseStrategy(String),

    /// A value was present but had the wrong type
    #[error("{name} must be of type {expected}")]
    InvalidType { name: String, expected: &'static str },

    #[error("A group named '{0}' already exists")]
    GroupAlreadyExists(String),

    /// The inbound message could not be decoded into a request
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// Anything else, including panics caught at the dispatch boundary
    #[error("An unknown error occurred: {0}")]
    Unknown(String),
}

impl RequestError {
    /// Returns the stable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MissingValue { .. } => ErrorCode::MissingValue,
            Self::BelowMinimum { .. } => ErrorCode::BelowMinimum,
            Self::AboveMaximum { .. } => ErrorCode::AboveMaximum,
            Self::OutOfRange { .. } => ErrorCode::OutOfRange,
            Self::MissingField { .. } => ErrorCode::MissingField,
            Self::ProxyGroupNotFound(_) => ErrorCode::ProxyGroupNotFound,
            Self::ServerGroupNotFound(_) => ErrorCode::ServerGroupNotFound,
            Self::ServerNotFound(_) => ErrorCode::ServerNotFound,
            Self::ProxyNotFound(_) => ErrorCode::ProxyNotFound,
            Self::UnknownProxyChooseStrategy(_) => ErrorCode::UnknownProxyChooseStrategy,
            Self::InvalidType { .. } => ErrorCode::InvalidType,
            Self::GroupAlreadyExists(_) => ErrorCode::GroupAlreadyExists,
            Self::MalformedRequest(_) => ErrorCode::MalformedRequest,
            Self::Unknown(_) => ErrorCode::Unknown,
        }
    }

    /// Returns the ordered context arguments for programmatic consumers.
    pub fn context(&self) -> Vec<Value> {
        match self {
            Self::MissingValue { name } => vec![Value::from(name.as_str())],
            Self::BelowMinimum { value, minimum, .. } => vec![value.clone(), minimum.clone()],
            Self::AboveMaximum { value, maximum, .. } => vec![value.clone(), maximum.clone()],
            Self::OutOfRange {
                value,
                minimum,
                maximum,
                ..
            } => vec![value.clone(), minimum.clone(), maximum.clone()],
            Self::MissingField { field } => vec![Value::from(field.as_str())],
            Self::ProxyGroupNotFound(id)
            | Self::ServerGroupNotFound(id)
            | Self::ServerNotFound(id)
            | Self::ProxyNotFound(id)
            | Self::GroupAlreadyExists(id)
            | Self::UnknownProxyChooseStrategy(id) => vec![Value::from(id.as_str())],
            Self::InvalidType { name, expected } => {
                vec![Value::from(name.as_str()), Value::from(*expected)]
            }
            Self::MalformedRequest(_) | Self::Unknown(_) => Vec::new(),
        }
    }
}

/// Wire representation of a [`RequestError`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
    pub code: u32,
    #[serde(default)]
    pub context: Vec<Value>,
}

impl From<&RequestError> for ErrorPayload {
    fn from(error: &RequestError) -> Self {
        Self {
            message: error.to_string(),
            code: error.code().as_u32(),
            context: error.context(),
        }
    }
}

/// Failures of the group persistence backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<StoreError> for RequestError {
    fn from(error: StoreError) -> Self {
        RequestError::Unknown(format!("failed to persist groups: {error}"))
    }
}

/// Enumeration of possible control server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Network-related errors such as binding failures or connection issues
    #[error("Network error: {0}")]
    Network(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}
