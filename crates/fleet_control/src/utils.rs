//! Factory functions for assembling the control plane.

use crate::config::ControlConfig;
use crate::error::StoreError;
use crate::messaging::RequestDispatcher;
use crate::persistence::{GroupStore, JsonGroupStore, MemoryGroupStore};
use crate::security::InputGuard;
use crate::server::ControlServer;
use crate::state::FleetState;
use std::sync::Arc;

/// Creates a dispatcher over an empty, non-durable fleet.
///
/// ```rust
/// # #[tokio::main]
/// # async fn main() {
/// use fleet_control::{create_dispatcher, ApiRequest, Payload, RequestType};
///
/// let dispatcher = create_dispatcher();
/// let response = dispatcher
///     .dispatch(ApiRequest::targeted(RequestType::ServerGroupDelete, "ghost", Payload::new()))
///     .await;
/// assert_eq!(response.error().map(|e| e.code), Some(7));
/// # }
/// ```
pub fn create_dispatcher() -> RequestDispatcher {
    let store: Arc<dyn GroupStore> = Arc::new(MemoryGroupStore::new());
    RequestDispatcher::new(Arc::new(FleetState::new(store)))
}

/// Loads the fleet from the JSON files in the configured data directory.
pub async fn open_fleet(config: &ControlConfig) -> Result<Arc<FleetState>, StoreError> {
    let store: Arc<dyn GroupStore> = Arc::new(JsonGroupStore::new(&config.data_directory));
    Ok(Arc::new(FleetState::load_from_store(store).await?))
}

/// Creates a control server over `state` using the configured limits.
pub fn create_server_with_config(config: ControlConfig, state: Arc<FleetState>) -> ControlServer {
    let dispatcher =
        RequestDispatcher::new(state).with_guard(InputGuard::new(config.security.clone()));
    ControlServer::new(config, dispatcher)
}
