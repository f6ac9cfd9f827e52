//! Fleet state: group definitions, running instances, and the repository that
//! owns them.

pub mod groups;
pub mod instances;
pub mod repository;

pub use groups::{ProxyChooseStrategy, ProxyGroup, ServerGroup, WILDCARD};
pub use instances::{CommandSender, InstanceCommand, InstanceSnapshot, Proxy, Server};
pub use repository::FleetState;
