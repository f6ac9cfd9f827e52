//! WebSocket transport for the control plane.

pub mod connections;
pub mod core;
pub mod handlers;

pub use connections::{ConnectionId, ConnectionRegistry};
pub use core::ControlServer;
