//! Group definitions owned by the fleet state.

use crate::error::RequestError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Value stored in place of an empty server-group or host-name set.
pub const WILDCARD: &str = "*";

fn wildcard_if_empty(values: BTreeSet<String>) -> BTreeSet<String> {
    if values.is_empty() {
        BTreeSet::from([WILDCARD.to_string()])
    } else {
        values
    }
}

/// How a proxy group picks the proxy for a joining player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProxyChooseStrategy {
    Random,
    RoundRobin,
    Balance,
}

impl ProxyChooseStrategy {
    pub const ALL: [ProxyChooseStrategy; 3] = [Self::Random, Self::RoundRobin, Self::Balance];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Random => "RANDOM",
            Self::RoundRobin => "ROUND_ROBIN",
            Self::Balance => "BALANCE",
        }
    }
}

impl FromStr for ProxyChooseStrategy {
    type Err = RequestError;

    /// Case-insensitive match against the known strategy names.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| RequestError::UnknownProxyChooseStrategy(value.to_string()))
    }
}

impl fmt::Display for ProxyChooseStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named template for game-server instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerGroup {
    name: String,
    online_amount: u32,
    max_amount: u32,
    ram: u32,
    #[serde(rename = "static")]
    is_static: bool,
    priority: i32,
    base: Option<String>,
    sort_out_states: BTreeSet<String>,
}

impl ServerGroup {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: String,
        online_amount: u32,
        max_amount: u32,
        ram: u32,
        is_static: bool,
        priority: i32,
        base: Option<String>,
        sort_out_states: BTreeSet<String>,
    ) -> Self {
        Self {
            name,
            online_amount,
            max_amount,
            ram,
            is_static,
            priority,
            base,
            sort_out_states,
        }
    }

    /// Unique group name, used as the lookup key.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Instances kept running at all times.
    pub fn online_amount(&self) -> u32 {
        self.online_amount
    }

    /// Upper bound on running instances.
    pub fn max_amount(&self) -> u32 {
        self.max_amount
    }

    /// Memory per instance, in megabytes.
    pub fn ram(&self) -> u32 {
        self.ram
    }

    /// Static groups keep their files between restarts.
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Start priority relative to other groups.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Base template name, if one is assigned.
    pub fn base(&self) -> Option<&str> {
        self.base.as_deref()
    }

    /// Server states in which an instance no longer counts as available.
    pub fn sort_out_states(&self) -> &BTreeSet<String> {
        &self.sort_out_states
    }

    pub fn set_online_amount(&mut self, value: u32) {
        self.online_amount = value;
    }

    pub fn set_max_amount(&mut self, value: u32) {
        self.max_amount = value;
    }

    pub fn set_ram(&mut self, value: u32) {
        self.ram = value;
    }

    pub fn set_static(&mut self, value: bool) {
        self.is_static = value;
    }

    pub fn set_priority(&mut self, value: i32) {
        self.priority = value;
    }

    /// `None` clears the base template.
    pub fn set_base(&mut self, value: Option<String>) {
        self.base = value;
    }

    /// Replaces the sort-out states. An empty set is stored as-is.
    pub fn set_sort_out_states(&mut self, value: BTreeSet<String>) {
        self.sort_out_states = value;
    }
}

/// A named template for proxy instances.
///
/// `server_groups` and `host_names` are never empty: an empty set is stored as
/// the single [`WILDCARD`] entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyGroup {
    name: String,
    max_player_count_per_proxy: u32,
    max_player_count: u32,
    keep_free_slots: u32,
    min_amount: u32,
    max_amount: u32,
    ram: u32,
    motd: String,
    #[serde(rename = "static")]
    is_static: bool,
    priority: i32,
    server_groups: BTreeSet<String>,
    base: Option<String>,
    proxy_choose_strategy: ProxyChooseStrategy,
    host_names: BTreeSet<String>,
}

impl ProxyGroup {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: String,
        max_player_count_per_proxy: u32,
        max_player_count: u32,
        keep_free_slots: u32,
        min_amount: u32,
        max_amount: u32,
        ram: u32,
        motd: String,
        is_static: bool,
        priority: i32,
        server_groups: BTreeSet<String>,
        base: Option<String>,
        proxy_choose_strategy: ProxyChooseStrategy,
        host_names: BTreeSet<String>,
    ) -> Self {
        Self {
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
            server_groups: wildcard_if_empty(server_groups),
            base,
            proxy_choose_strategy,
            host_names: wildcard_if_empty(host_names),
        }
    }

    /// Unique group name, used as the lookup key.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Player cap for a single proxy instance.
    pub fn max_player_count_per_proxy(&self) -> u32 {
        self.max_player_count_per_proxy
    }

    /// Player cap across the whole group.
    pub fn max_player_count(&self) -> u32 {
        self.max_player_count
    }

    /// Free player slots to hold open before starting another proxy.
    pub fn keep_free_slots(&self) -> u32 {
        self.keep_free_slots
    }

    /// Lower bound on running instances.
    pub fn min_amount(&self) -> u32 {
        self.min_amount
    }

    /// Upper bound on running instances.
    pub fn max_amount(&self) -> u32 {
        self.max_amount
    }

    /// Memory per instance, in megabytes.
    pub fn ram(&self) -> u32 {
        self.ram
    }

    /// Message of the day shown in the server list.
    pub fn motd(&self) -> &str {
        &self.motd
    }

    /// Static groups keep their files between restarts.
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Start priority relative to other groups.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Server groups this proxy routes to, or the wildcard.
    pub fn server_groups(&self) -> &BTreeSet<String> {
        &self.server_groups
    }

    /// Base template name, if one is assigned.
    pub fn base(&self) -> Option<&str> {
        self.base.as_deref()
    }

    pub fn proxy_choose_strategy(&self) -> ProxyChooseStrategy {
        self.proxy_choose_strategy
    }

    /// Host names the proxy answers for, or the wildcard.
    pub fn host_names(&self) -> &BTreeSet<String> {
        &self.host_names
    }

    pub fn set_max_player_count_per_proxy(&mut self, value: u32) {
        self.max_player_count_per_proxy = value;
    }

    pub fn set_max_player_count(&mut self, value: u32) {
        self.max_player_count = value;
    }

    pub fn set_keep_free_slots(&mut self, value: u32) {
        self.keep_free_slots = value;
    }

    pub fn set_min_amount(&mut self, value: u32) {
        self.min_amount = value;
    }

    pub fn set_max_amount(&mut self, value: u32) {
        self.max_amount = value;
    }

    pub fn set_ram(&mut self, value: u32) {
        self.ram = value;
    }

    pub fn set_motd(&mut self, value: String) {
        self.motd = value;
    }

    pub fn set_static(&mut self, value: bool) {
        self.is_static = value;
    }

    pub fn set_priority(&mut self, value: i32) {
        self.priority = value;
    }

    /// `None` clears the base template.
    pub fn set_base(&mut self, value: Option<String>) {
        self.base = value;
    }

    pub fn set_proxy_choose_strategy(&mut self, value: ProxyChooseStrategy) {
        self.proxy_choose_strategy = value;
    }

    /// Replaces the host names. An empty set becomes the wildcard.
    pub fn set_host_names(&mut self, value: BTreeSet<String>) {
        self.host_names = wildcard_if_empty(value);
    }

    /// Restores the wildcard invariant on groups read from storage.
    pub(crate) fn normalize(&mut self) {
        self.server_groups = wildcard_if_empty(std::mem::take(&mut self.server_groups));
        self.host_names = wildcard_if_empty(std::mem::take(&mut self.host_names));
    }
}
