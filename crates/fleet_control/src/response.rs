//! Replies sent back to the requester.
//!
//! A reply echoes the request it answers and carries exactly one outcome:
//! either a result value or an [`ErrorPayload`]. The outcome is tagged with a
//! `status` field on the wire.
//!
//! ```json
//! {
//!   "request": { "type": "SG_DELETE", "target": "ghost" },
//!   "status": "error",
//!   "error": { "message": "ServerGroup 'ghost' could not be found", "code": 7, "context": ["ghost"] }
//! }
//! ```

use crate::error::{ErrorPayload, RequestError};
use crate::messaging::types::ApiRequest;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Either the result of a successful operation or the error that stopped it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResponseOutcome {
    Success { data: Value },
    Error { error: ErrorPayload },
}

/// Reply to a single request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    /// The request being answered; absent when the inbound message could not
    /// be decoded at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<ApiRequest>,

    #[serde(flatten)]
    pub outcome: ResponseOutcome,
}

impl ApiResponse {
    pub fn success(request: ApiRequest, data: Value) -> Self {
        Self {
            request: Some(request),
            outcome: ResponseOutcome::Success { data },
        }
    }

    pub fn failure(request: ApiRequest, error: &RequestError) -> Self {
        Self {
            request: Some(request),
            outcome: ResponseOutcome::Error {
                error: error.into(),
            },
        }
    }

    /// Reply for input that never became a request.
    pub fn undecodable(error: &RequestError) -> Self {
        Self {
            request: None,
            outcome: ResponseOutcome::Error {
                error: error.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ResponseOutcome::Success { .. })
    }

    pub fn result(&self) -> Option<&Value> {
        match &self.outcome {
            ResponseOutcome::Success { data } => Some(data),
            ResponseOutcome::Error { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorPayload> {
        match &self.outcome {
            ResponseOutcome::Success { .. } => None,
            ResponseOutcome::Error { error } => Some(error),
        }
    }

    /// Serializes the reply for the wire.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
