//! Validated operations, built from a request before anything is mutated.
//!
//! Each request type maps to exactly one variant here. Building the variant
//! runs every validation for that request; applying it cannot fail. This is
//! what keeps a rejected request from leaving an entity half-changed.

use super::payload::Payload;
use super::types::RequestType;
use crate::error::RequestError;
use crate::state::{Proxy, ProxyChooseStrategy, ProxyGroup, Server, ServerGroup};
use crate::validation::{amount, not_null, parse_proxy_choose_strategy, priority, require_field};
use std::collections::BTreeSet;

/// Payload key holding the argument of entity-scoped operations.
pub const VALUE: &str = "value";

fn unexpected(request_type: RequestType, scope: &str) -> RequestError {
    RequestError::Unknown(format!("{request_type} is not a {scope} operation"))
}

/// Reads an optional base template name; an empty string clears it.
fn base_name(data: &Payload, key: &str) -> Result<Option<String>, RequestError> {
    Ok(data.string(key, "Base")?.filter(|base| !base.is_empty()))
}

/// Builds a complete server group from a `G_CREATE_SERVER_GROUP` payload.
pub fn new_server_group(data: &Payload) -> Result<ServerGroup, RequestError> {
    let name = not_null(data.string("name", "Name")?, Some("Name"))?;
    let online_amount = amount(data.integer("onlineAmount", "OnlineAmount")?, 0, "OnlineAmount")?;
    let max_amount = amount(data.integer("maxAmount", "MaxAmount")?, 0, "MaxAmount")?;
    let ram = amount(data.integer("ram", "Ram")?, 1, "Ram")?;
    let is_static = not_null(data.boolean("static", "Static")?, Some("Static"))?;
    let priority = priority(data.integer("priority", "Priority")?, "Priority")?;
    let base = base_name(data, "base")?;
    let sort_out_states = not_null(
        data.string_set("sortOutStates", "SortOutStates")?,
        Some("SortOutStates"),
    )?;

    Ok(ServerGroup::new(
        name,
        online_amount,
        max_amount,
        ram,
        is_static,
        priority,
        base,
        sort_out_states,
    ))
}

/// Builds a complete proxy group from a `G_CREATE_PROXY_GROUP` payload.
///
/// Empty server-group and host-name sets become the wildcard.
pub fn new_proxy_group(data: &Payload) -> Result<ProxyGroup, RequestError> {
    let name = not_null(data.string("name", "Name")?, Some("Name"))?;
    let max_player_count_per_proxy = amount(
        data.integer("maxPlayerCountPerProxy", "MaxPlayerCountPerProxy")?,
        0,
        "MaxPlayerCountPerProxy",
    )?;
    let max_player_count = amount(data.integer("maxPlayerCount", "MaxPlayerCount")?, 0, "MaxPlayerCount")?;
    let keep_free_slots = amount(data.integer("keepFreeSlots", "KeepFreeSlots")?, 0, "KeepFreeSlots")?;
    let min_amount = amount(data.integer("minAmount", "MinAmount")?, 0, "MinAmount")?;
    let max_amount = amount(data.integer("maxAmount", "MaxAmount")?, 0, "MaxAmount")?;
    let ram = amount(data.integer("ram", "Ram")?, 1, "Ram")?;
    let motd = not_null(data.string("motd", "MOTD")?, Some("MOTD"))?;
    let is_static = not_null(data.boolean("static", "Static")?, Some("Static"))?;
    let priority = priority(data.integer("priority", "Priority")?, "Priority")?;
    let server_groups = not_null(
        data.string_set("serverGroups", "ServerGroups")?,
        Some("ServerGroups"),
    )?;
    let base = base_name(data, "base")?;
    let strategy = parse_proxy_choose_strategy(
        data.string("proxyChooseStrategy", "ProxyChooseStrategy")?,
        "ProxyChooseStrategy",
    )?;
    let host_names = not_null(data.string_set("hostNames", "HostNames")?, Some("HostNames"))?;

    Ok(ProxyGroup::new(
        name,
        max_player_count_per_proxy,
        max_player_count,
        keep_free_slots,
        min_amount,
        max_amount,
        ram,
        motd,
        is_static,
        priority,
        server_groups,
        base,
        strategy,
        host_names,
    ))
}

/// A single-field change to a proxy group.
#[derive(Debug, Clone, PartialEq)]
pub enum ProxyGroupChange {
    MaxPlayerCount(u32),
    MaxPlayerCountPerProxy(u32),
    KeepFreeSlots(u32),
    MinAmount(u32),
    MaxAmount(u32),
    Ram(u32),
    Motd(String),
    Static(bool),
    Priority(i32),
    Base(Option<String>),
    ProxyChooseStrategy(ProxyChooseStrategy),
    HostNames(BTreeSet<String>),
}

impl ProxyGroupChange {
    /// Validates the `value` field for a `PG_SET_*` request.
    pub fn parse(request_type: RequestType, data: &Payload) -> Result<Self, RequestError> {
        use RequestType::*;

        let change = match request_type {
            ProxyGroupSetMaxPlayerCount => {
                Self::MaxPlayerCount(amount(data.integer(VALUE, "MaxPlayerCount")?, 0, "MaxPlayerCount")?)
            }
            ProxyGroupSetMaxPlayerCountPerProxy => Self::MaxPlayerCountPerProxy(amount(
                data.integer(VALUE, "MaxPlayerCountPerProxy")?,
                0,
                "MaxPlayerCountPerProxy",
            )?),
            ProxyGroupSetKeepFreeSlots => {
                Self::KeepFreeSlots(amount(data.integer(VALUE, "KeepFreeSlots")?, 0, "KeepFreeSlots")?)
            }
            ProxyGroupSetMinAmount => {
                Self::MinAmount(amount(data.integer(VALUE, "MinAmount")?, 0, "MinAmount")?)
            }
            ProxyGroupSetMaxAmount => {
                Self::MaxAmount(amount(data.integer(VALUE, "MaxAmount")?, 0, "MaxAmount")?)
            }
            ProxyGroupSetRam => Self::Ram(amount(data.integer(VALUE, "Ram")?, 1, "Ram")?),
            ProxyGroupSetMotd => Self::Motd(not_null(data.string(VALUE, "MOTD")?, Some("MOTD"))?),
            ProxyGroupSetStatic => {
                Self::Static(not_null(data.boolean(VALUE, "Static")?, Some("Static"))?)
            }
            ProxyGroupSetPriority => {
                Self::Priority(priority(data.integer(VALUE, "Priority")?, "Priority")?)
            }
            ProxyGroupSetBase => {
                require_field(data, VALUE, "base")?;
                Self::Base(base_name(data, VALUE)?)
            }
            ProxyGroupSetProxyChooseStrategy => Self::ProxyChooseStrategy(parse_proxy_choose_strategy(
                data.string(VALUE, "ProxyChooseStrategy")?,
                "ProxyChooseStrategy",
            )?),
            ProxyGroupSetHostNames => Self::HostNames(not_null(
                data.string_set(VALUE, "HostNames")?,
                Some("HostNames"),
            )?),
            other => return Err(unexpected(other, "proxy group setter")),
        };
        Ok(change)
    }

    pub fn apply(self, group: &mut ProxyGroup) {
        match self {
            Self::MaxPlayerCount(value) => group.set_max_player_count(value),
            Self::MaxPlayerCountPerProxy(value) => group.set_max_player_count_per_proxy(value),
            Self::KeepFreeSlots(value) => group.set_keep_free_slots(value),
            Self::MinAmount(value) => group.set_min_amount(value),
            Self::MaxAmount(value) => group.set_max_amount(value),
            Self::Ram(value) => group.set_ram(value),
            Self::Motd(value) => group.set_motd(value),
            Self::Static(value) => group.set_static(value),
            Self::Priority(value) => group.set_priority(value),
            Self::Base(value) => group.set_base(value),
            Self::ProxyChooseStrategy(value) => group.set_proxy_choose_strategy(value),
            Self::HostNames(value) => group.set_host_names(value),
        }
    }
}

/// A single-field change to a server group.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerGroupChange {
    MaxAmount(u32),
    Ram(u32),
    Static(bool),
    Priority(i32),
    Base(Option<String>),
    OnlineAmount(u32),
    SortOutStates(BTreeSet<String>),
}

impl ServerGroupChange {
    /// Validates the `value` field for an `SG_SET_*` request.
    pub fn parse(request_type: RequestType, data: &Payload) -> Result<Self, RequestError> {
        use RequestType::*;

        let change = match request_type {
            ServerGroupSetMaxAmount => {
                Self::MaxAmount(amount(data.integer(VALUE, "MaxAmount")?, 0, "MaxAmount")?)
            }
            ServerGroupSetRam => Self::Ram(amount(data.integer(VALUE, "Ram")?, 1, "Ram")?),
            ServerGroupSetStatic => {
                Self::Static(not_null(data.boolean(VALUE, "Static")?, Some("Static"))?)
            }
            ServerGroupSetPriority => {
                Self::Priority(priority(data.integer(VALUE, "Priority")?, "Priority")?)
            }
            ServerGroupSetBase => {
                require_field(data, VALUE, "base")?;
                Self::Base(base_name(data, VALUE)?)
            }
            ServerGroupSetOnlineAmount => {
                Self::OnlineAmount(amount(data.integer(VALUE, "OnlineAmount")?, 0, "OnlineAmount")?)
            }
            ServerGroupSetSortOutStates => Self::SortOutStates(not_null(
                data.string_set(VALUE, "SortOutStates")?,
                Some("SortOutStates"),
            )?),
            other => return Err(unexpected(other, "server group setter")),
        };
        Ok(change)
    }

    pub fn apply(self, group: &mut ServerGroup) {
        match self {
            Self::MaxAmount(value) => group.set_max_amount(value),
            Self::Ram(value) => group.set_ram(value),
            Self::Static(value) => group.set_static(value),
            Self::Priority(value) => group.set_priority(value),
            Self::Base(value) => group.set_base(value),
            Self::OnlineAmount(value) => group.set_online_amount(value),
            Self::SortOutStates(value) => group.set_sort_out_states(value),
        }
    }
}

/// An action on a running server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerAction {
    ExecuteCommand(String),
    Stop,
    SetState(String),
    SetExtra(String),
}

impl ServerAction {
    pub fn parse(request_type: RequestType, data: &Payload) -> Result<Self, RequestError> {
        match request_type {
            RequestType::ServerExecuteCommand => Ok(Self::ExecuteCommand(not_null(
                data.string(VALUE, "Command")?,
                Some("Command"),
            )?)),
            RequestType::ServerStop => Ok(Self::Stop),
            RequestType::ServerSetState => Ok(Self::SetState(not_null(
                data.string(VALUE, "State")?,
                Some("State"),
            )?)),
            RequestType::ServerSetExtra => Ok(Self::SetExtra(not_null(
                data.string(VALUE, "Extra")?,
                Some("Extra"),
            )?)),
            other => Err(unexpected(other, "server")),
        }
    }

    pub fn apply(self, server: &Server) {
        match self {
            Self::ExecuteCommand(command) => server.execute_command(command),
            Self::Stop => server.stop(),
            Self::SetState(state) => server.set_state(state),
            Self::SetExtra(extra) => server.set_extra(extra),
        }
    }
}

/// An action on a running proxy.
#[derive(Debug, Clone, PartialEq)]
pub enum ProxyAction {
    ExecuteCommand(String),
    Stop,
}

impl ProxyAction {
    pub fn parse(request_type: RequestType, data: &Payload) -> Result<Self, RequestError> {
        match request_type {
            RequestType::ProxyExecuteCommand => Ok(Self::ExecuteCommand(not_null(
                data.string(VALUE, "Command")?,
                Some("Command"),
            )?)),
            RequestType::ProxyStop => Ok(Self::Stop),
            other => Err(unexpected(other, "proxy")),
        }
    }

    pub fn apply(self, proxy: &Proxy) {
        match self {
            Self::ExecuteCommand(command) => proxy.execute_command(command),
            Self::Stop => proxy.stop(),
        }
    }
}
