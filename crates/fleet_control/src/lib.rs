//! # Fleet Control - Request Dispatch and Validation Engine
//!
//! The control-plane request processor of a fleet-management service. Clients
//! (administrative tools and the managed instances themselves) send typed,
//! addressed requests to create and mutate server groups and proxy groups, and
//! to issue lifecycle commands to running server and proxy instances.
//!
//! ## Design Philosophy
//!
//! The dispatcher is the single choke point for fleet state:
//!
//! * **Total dispatch** - every request, however malformed, gets a structured reply
//! * **Validate before mutate** - a rejected request never changes an entity
//! * **Stable error taxonomy** - every failure carries a numeric code and context
//! * **Explicit dependencies** - the fleet state is injected, never global
//!
//! ## Architecture Overview
//!
//! ### Core Components
//!
//! * **Field Validator** ([`validation`]) - non-null, minimum, maximum and range checks
//! * **Fleet State** ([`state`]) - concurrent group and instance collections
//! * **Request Dispatcher** ([`RequestDispatcher`]) - routing, validation and mutation
//! * **Response Builder** ([`ApiResponse`]) - exactly one of result or error
//! * **Group Store** ([`persistence`]) - durable write-back of group collections
//!
//! ### Message Flow
//!
//! 1. Client sends a WebSocket text frame with `{type, target, data}`
//! 2. The input guard checks size, depth and collection limits
//! 3. The frame is decoded into an [`ApiRequest`]
//! 4. The dispatcher resolves the target and validates the payload
//! 5. The change is applied and the owning group collection is persisted
//! 6. An [`ApiResponse`] is sent back on the same connection
//!
//! ```rust
//! # #[tokio::main]
//! # async fn main() {
//! use fleet_control::{create_dispatcher, ApiRequest, Payload, RequestType};
//!
//! let dispatcher = create_dispatcher();
//! let data = Payload::new()
//!     .with("name", "lobby")
//!     .with("onlineAmount", 1)
//!     .with("maxAmount", 5)
//!     .with("ram", 512)
//!     .with("static", false)
//!     .with("priority", 1)
//!     .with("sortOutStates", Vec::<String>::new());
//!
//! let response = dispatcher
//!     .dispatch(ApiRequest::general(RequestType::CreateServerGroup, data))
//!     .await;
//! assert!(response.is_success());
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Request failures are [`RequestError`]s; their codes are listed on
//! [`ErrorCode`]. Transport failures are [`ServerError`]s and storage failures
//! are [`StoreError`]s.
//!
//! ## Thread Safety
//!
//! * Group and instance collections are `DashMap`s, so writes to one entity are
//!   serialized while unrelated entities proceed in parallel
//! * Persistence of each group class is serialized, so saves land in order
//! * Connections are served on independent tasks

pub use config::{ControlConfig, SecurityConfig};
pub use error::{ErrorCode, ErrorPayload, RequestError, ServerError, StoreError, NEXT_FREE_ERROR_CODE};
pub use messaging::{ApiRequest, FieldValue, Payload, RequestDispatcher, RequestType, TargetKind};
pub use persistence::{GroupStore, JsonGroupStore, MemoryGroupStore};
pub use response::{ApiResponse, ResponseOutcome};
pub use server::ControlServer;
pub use state::FleetState;
pub use stats::{DispatchStats, StatsSnapshot};
pub use utils::{create_dispatcher, create_server_with_config, open_fleet};

pub mod config;
pub mod error;
pub mod messaging;
pub mod persistence;
pub mod response;
pub mod security;
pub mod server;
pub mod state;
pub mod stats;
pub mod utils;
pub mod validation;

#[cfg(test)]
mod tests;
