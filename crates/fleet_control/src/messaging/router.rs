//! Request routing for the control plane.
//!
//! [`RequestDispatcher`] is the single choke point between decoded requests and
//! the fleet state. For every request it:
//!
//! 1. Classifies the operation by [`TargetKind`]
//! 2. Resolves the target entity, failing with the kind-specific not-found code
//! 3. Validates the payload into a typed operation (see [`super::operations`])
//! 4. Applies the operation and persists the owning group collection once,
//!    undoing the change if the save fails
//! 5. Packages the outcome into an [`ApiResponse`]
//!
//! Dispatch is total: validation failures, persistence failures and panics all
//! come back as error responses.

use super::operations::{
    new_proxy_group, new_server_group, ProxyAction, ProxyGroupChange, ServerAction, ServerGroupChange,
};
use super::types::{ApiRequest, RequestType, TargetKind};
use crate::error::RequestError;
use crate::response::ApiResponse;
use crate::security::InputGuard;
use crate::state::FleetState;
use crate::stats::DispatchStats;
use crate::validation::not_null;
use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Tracing target for everything the dispatcher logs.
pub const DISPATCH_TARGET: &str = "fleet_control::dispatch";

/// Routes requests to their validation and mutation logic.
#[derive(Debug, Clone)]
pub struct RequestDispatcher {
    state: Arc<FleetState>,
    guard: InputGuard,
    stats: Arc<DispatchStats>,
}

impl RequestDispatcher {
    /// Creates a dispatcher over `state` with default input limits.
    pub fn new(state: Arc<FleetState>) -> Self {
        Self {
            state,
            guard: InputGuard::default(),
            stats: Arc::new(DispatchStats::new()),
        }
    }

    /// Replaces the input guard used by [`Self::handle_message`].
    pub fn with_guard(mut self, guard: InputGuard) -> Self {
        self.guard = guard;
        self
    }

    pub fn state(&self) -> &Arc<FleetState> {
        &self.state
    }

    pub fn guard(&self) -> &InputGuard {
        &self.guard
    }

    pub fn stats(&self) -> &Arc<DispatchStats> {
        &self.stats
    }

    /// Handles one decoded request and always produces a response.
    pub async fn dispatch(&self, request: ApiRequest) -> ApiResponse {
        let outcome = AssertUnwindSafe(self.execute(&request)).catch_unwind().await;
        let result = outcome.unwrap_or_else(|panic| {
            let message = panic_message(panic.as_ref());
            error!(
                target: DISPATCH_TARGET,
                request_type = %request.request_type,
                "💥 Panic while dispatching request: {}", message
            );
            Err(RequestError::Unknown(message))
        });

        match result {
            Ok(data) => {
                self.stats.record_success();
                debug!(
                    target: DISPATCH_TARGET,
                    request_type = %request.request_type,
                    target_id = request.target.as_deref().unwrap_or("-"),
                    "✅ Request completed"
                );
                ApiResponse::success(request, data)
            }
            Err(error) => {
                self.stats.record_failure(error.code());
                warn!(
                    target: DISPATCH_TARGET,
                    request_type = %request.request_type,
                    target_id = request.target.as_deref().unwrap_or("-"),
                    code = error.code().as_u32(),
                    "❌ Request rejected: {}", error
                );
                ApiResponse::failure(request, &error)
            }
        }
    }

    /// Decodes a raw text message and dispatches it.
    ///
    /// Input rejected by the guard or not decodable as a request yields a
    /// malformed-request response without an echoed request.
    pub async fn handle_message(&self, text: &str) -> ApiResponse {
        let json = match self.guard.inspect(text) {
            Ok(json) => json,
            Err(e) => return self.reject(e.into()),
        };

        match serde_json::from_value::<ApiRequest>(json) {
            Ok(request) => self.dispatch(request).await,
            Err(e) => self.reject(RequestError::MalformedRequest(e.to_string())),
        }
    }

    fn reject(&self, error: RequestError) -> ApiResponse {
        self.stats.record_failure(error.code());
        warn!(target: DISPATCH_TARGET, "🚫 Undecodable request: {}", error);
        ApiResponse::undecodable(&error)
    }

    async fn execute(&self, request: &ApiRequest) -> Result<Value, RequestError> {
        match request.request_type.target_kind() {
            TargetKind::General => self.execute_general(request).await,
            TargetKind::ProxyGroup => {
                let name = not_null(request.target.as_deref(), Some("ProxyGroupName"))?;
                self.execute_proxy_group(name, request).await
            }
            TargetKind::ServerGroup => {
                let name = not_null(request.target.as_deref(), Some("ServerGroupName"))?;
                self.execute_server_group(name, request).await
            }
            TargetKind::Server => {
                let identifier = not_null(request.target.as_deref(), Some("ServerIdentifier"))?;
                self.execute_server(identifier, request)
            }
            TargetKind::Proxy => {
                let identifier = not_null(request.target.as_deref(), Some("ProxyIdentifier"))?;
                self.execute_proxy(identifier, request)
            }
        }
    }

    async fn execute_general(&self, request: &ApiRequest) -> Result<Value, RequestError> {
        match request.request_type {
            RequestType::CreateServerGroup => {
                let group = new_server_group(&request.data)?;
                let snapshot = snapshot(&group)?;
                let name = group.name().to_string();
                self.state.create_server_group(group).await?;
                info!(target: DISPATCH_TARGET, "🆕 Created server group '{}'", name);
                Ok(snapshot)
            }
            RequestType::CreateProxyGroup => {
                let group = new_proxy_group(&request.data)?;
                let snapshot = snapshot(&group)?;
                let name = group.name().to_string();
                self.state.create_proxy_group(group).await?;
                info!(target: DISPATCH_TARGET, "🆕 Created proxy group '{}'", name);
                Ok(snapshot)
            }
            other => Err(RequestError::Unknown(format!("{other} is not a creation operation"))),
        }
    }

    async fn execute_proxy_group(&self, name: &str, request: &ApiRequest) -> Result<Value, RequestError> {
        let not_found = || RequestError::ProxyGroupNotFound(name.to_string());
        if self.state.find_proxy_group(name).is_none() {
            return Err(not_found());
        }

        if request.request_type == RequestType::ProxyGroupDelete {
            let removed = self.state.delete_proxy_group(name).await?.ok_or_else(not_found)?;
            info!(target: DISPATCH_TARGET, "🗑️ Deleted proxy group '{}'", name);
            return snapshot(&removed);
        }

        let change = ProxyGroupChange::parse(request.request_type, &request.data)?;
        let updated = self
            .state
            .modify_proxy_group(name, |group| change.apply(group))
            .await?
            .ok_or_else(not_found)?;
        snapshot(&updated)
    }

    async fn execute_server_group(&self, name: &str, request: &ApiRequest) -> Result<Value, RequestError> {
        let not_found = || RequestError::ServerGroupNotFound(name.to_string());
        if self.state.find_server_group(name).is_none() {
            return Err(not_found());
        }

        if request.request_type == RequestType::ServerGroupDelete {
            let removed = self.state.delete_server_group(name).await?.ok_or_else(not_found)?;
            info!(target: DISPATCH_TARGET, "🗑️ Deleted server group '{}'", name);
            return snapshot(&removed);
        }

        let change = ServerGroupChange::parse(request.request_type, &request.data)?;
        let updated = self
            .state
            .modify_server_group(name, |group| change.apply(group))
            .await?
            .ok_or_else(not_found)?;
        snapshot(&updated)
    }

    fn execute_server(&self, identifier: &str, request: &ApiRequest) -> Result<Value, RequestError> {
        let server = self
            .state
            .find_server(identifier)
            .ok_or_else(|| RequestError::ServerNotFound(identifier.to_string()))?;
        ServerAction::parse(request.request_type, &request.data)?.apply(&server);
        snapshot(&server.snapshot())
    }

    fn execute_proxy(&self, identifier: &str, request: &ApiRequest) -> Result<Value, RequestError> {
        let proxy = self
            .state
            .find_proxy(identifier)
            .ok_or_else(|| RequestError::ProxyNotFound(identifier.to_string()))?;
        ProxyAction::parse(request.request_type, &request.data)?.apply(&proxy);
        snapshot(&proxy.snapshot())
    }
}

fn snapshot<T: Serialize>(value: &T) -> Result<Value, RequestError> {
    serde_json::to_value(value).map_err(|e| RequestError::Unknown(e.to_string()))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
