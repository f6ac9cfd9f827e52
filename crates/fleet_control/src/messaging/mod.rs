//! Request decoding, validation and routing.
//!
//! This module turns inbound control messages into typed requests, validates
//! them into operations and routes them against the fleet state.

pub mod operations;
pub mod payload;
pub mod router;
pub mod types;

pub use payload::{FieldValue, Payload};
pub use router::{RequestDispatcher, DISPATCH_TARGET};
pub use types::{ApiRequest, RequestType, TargetKind};
