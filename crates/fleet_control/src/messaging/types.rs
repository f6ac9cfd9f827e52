//! Request type definitions for control-plane communication.
//!
//! A request names one operation, optionally the entity it targets, and a
//! payload. The operation alone determines which entity class is addressed.
//!
//! # Example
//!
//! ```json
//! {
//!   "type": "PG_SET_RAM",
//!   "target": "Proxy",
//!   "data": { "value": 1024 }
//! }
//! ```

use super::payload::Payload;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The entity class an operation is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// Creation operations; no target identifier.
    General,
    ProxyGroup,
    ServerGroup,
    Server,
    Proxy,
}

/// Every operation the dispatcher understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestType {
    #[serde(rename = "G_CREATE_SERVER_GROUP")]
    CreateServerGroup,
    #[serde(rename = "G_CREATE_PROXY_GROUP")]
    CreateProxyGroup,

    #[serde(rename = "PG_SET_MAX_PLAYER_COUNT")]
    ProxyGroupSetMaxPlayerCount,
    #[serde(rename = "PG_SET_MAX_PLAYER_COUNT_PER_PROXY")]
    ProxyGroupSetMaxPlayerCountPerProxy,
    #[serde(rename = "PG_SET_KEEP_FREE_SLOTS")]
    ProxyGroupSetKeepFreeSlots,
    #[serde(rename = "PG_SET_MIN_AMOUNT")]
    ProxyGroupSetMinAmount,
    #[serde(rename = "PG_SET_MAX_AMOUNT")]
    ProxyGroupSetMaxAmount,
    #[serde(rename = "PG_SET_RAM")]
    ProxyGroupSetRam,
    #[serde(rename = "PG_SET_MOTD")]
    ProxyGroupSetMotd,
    #[serde(rename = "PG_SET_STATIC")]
    ProxyGroupSetStatic,
    #[serde(rename = "PG_SET_PRIORITY")]
    ProxyGroupSetPriority,
    #[serde(rename = "PG_SET_BASE")]
    ProxyGroupSetBase,
    #[serde(rename = "PG_SET_PROXY_CHOOSE_STRATEGY")]
    ProxyGroupSetProxyChooseStrategy,
    #[serde(rename = "PG_SET_HOST_NAMES")]
    ProxyGroupSetHostNames,
    #[serde(rename = "PG_DELETE")]
    ProxyGroupDelete,

    #[serde(rename = "SG_SET_MAX_AMOUNT")]
    ServerGroupSetMaxAmount,
    #[serde(rename = "SG_SET_RAM")]
    ServerGroupSetRam,
    #[serde(rename = "SG_SET_STATIC")]
    ServerGroupSetStatic,
    #[serde(rename = "SG_SET_PRIORITY")]
    ServerGroupSetPriority,
    #[serde(rename = "SG_SET_BASE")]
    ServerGroupSetBase,
    #[serde(rename = "SG_SET_ONLINE_AMOUNT")]
    ServerGroupSetOnlineAmount,
    #[serde(rename = "SG_SET_SORT_OUT_STATES")]
    ServerGroupSetSortOutStates,
    #[serde(rename = "SG_DELETE")]
    ServerGroupDelete,

    #[serde(rename = "S_EXECUTE_COMMAND")]
    ServerExecuteCommand,
    #[serde(rename = "S_STOP")]
    ServerStop,
    #[serde(rename = "S_SET_STATE")]
    ServerSetState,
    #[serde(rename = "S_SET_EXTRA")]
    ServerSetExtra,

    #[serde(rename = "P_EXECUTE_COMMAND")]
    ProxyExecuteCommand,
    #[serde(rename = "P_STOP")]
    ProxyStop,
}

impl RequestType {
    /// All operations, in wire order.
    pub const ALL: [RequestType; 29] = [
        Self::CreateServerGroup,
        Self::CreateProxyGroup,
        Self::ProxyGroupSetMaxPlayerCount,
        Self::ProxyGroupSetMaxPlayerCountPerProxy,
        Self::ProxyGroupSetKeepFreeSlots,
        Self::ProxyGroupSetMinAmount,
        Self::ProxyGroupSetMaxAmount,
        Self::ProxyGroupSetRam,
        Self::ProxyGroupSetMotd,
        Self::ProxyGroupSetStatic,
        Self::ProxyGroupSetPriority,
        Self::ProxyGroupSetBase,
        Self::ProxyGroupSetProxyChooseStrategy,
        Self::ProxyGroupSetHostNames,
        Self::ProxyGroupDelete,
        Self::ServerGroupSetMaxAmount,
        Self::ServerGroupSetRam,
        Self::ServerGroupSetStatic,
        Self::ServerGroupSetPriority,
        Self::ServerGroupSetBase,
        Self::ServerGroupSetOnlineAmount,
        Self::ServerGroupSetSortOutStates,
        Self::ServerGroupDelete,
        Self::ServerExecuteCommand,
        Self::ServerStop,
        Self::ServerSetState,
        Self::ServerSetExtra,
        Self::ProxyExecuteCommand,
        Self::ProxyStop,
    ];

    /// Returns the entity class this operation addresses.
    pub fn target_kind(self) -> TargetKind {
        use RequestType::*;
        match self {
            CreateServerGroup | CreateProxyGroup => TargetKind::General,
            ProxyGroupSetMaxPlayerCount
            | ProxyGroupSetMaxPlayerCountPerProxy
            | ProxyGroupSetKeepFreeSlots
            | ProxyGroupSetMinAmount
            | ProxyGroupSetMaxAmount
            | ProxyGroupSetRam
            | ProxyGroupSetMotd
            | ProxyGroupSetStatic
            | ProxyGroupSetPriority
            | ProxyGroupSetBase
            | ProxyGroupSetProxyChooseStrategy
            | ProxyGroupSetHostNames
            | ProxyGroupDelete => TargetKind::ProxyGroup,
            ServerGroupSetMaxAmount
            | ServerGroupSetRam
            | ServerGroupSetStatic
            | ServerGroupSetPriority
            | ServerGroupSetBase
            | ServerGroupSetOnlineAmount
            | ServerGroupSetSortOutStates
            | ServerGroupDelete => TargetKind::ServerGroup,
            ServerExecuteCommand | ServerStop | ServerSetState | ServerSetExtra => {
                TargetKind::Server
            }
            ProxyExecuteCommand | ProxyStop => TargetKind::Proxy,
        }
    }

    /// Returns the wire name, e.g. `PG_SET_RAM`.
    pub fn wire_name(self) -> String {
        serde_json::to_value(self)
            .ok()
            .and_then(|value| value.as_str().map(str::to_string))
            .unwrap_or_else(|| format!("{self:?}"))
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.wire_name())
    }
}

/// A decoded request. Immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiRequest {
    #[serde(rename = "type")]
    pub request_type: RequestType,

    /// Group name or instance identifier; absent for creation operations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    #[serde(default)]
    pub data: Payload,
}

impl ApiRequest {
    pub fn new(request_type: RequestType, target: Option<String>, data: Payload) -> Self {
        Self {
            request_type,
            target,
            data,
        }
    }

    /// Creation request with no target.
    pub fn general(request_type: RequestType, data: Payload) -> Self {
        Self::new(request_type, None, data)
    }

    /// Entity-scoped request.
    pub fn targeted(request_type: RequestType, target: impl Into<String>, data: Payload) -> Self {
        Self::new(request_type, Some(target.into()), data)
    }
}
