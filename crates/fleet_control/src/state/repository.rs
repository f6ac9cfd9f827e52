//! Authoritative in-memory fleet state.
//!
//! Collections are `DashMap`s, so reads and writes to one named entity are
//! serialized by the entry lock while unrelated entities proceed in parallel.
//! No map reference is ever held across an `.await`.
//!
//! Group changes go through `create_*`, `modify_*` and `delete_*`, which save
//! the owning collection under a per-class write lock and undo the in-memory
//! change if that save fails.

use super::groups::{ProxyGroup, ServerGroup};
use super::instances::{Proxy, Server};
use crate::error::{RequestError, StoreError};
use crate::persistence::GroupStore;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Owner of all group and instance entities.
pub struct FleetState {
    server_groups: DashMap<String, ServerGroup>,
    proxy_groups: DashMap<String, ProxyGroup>,
    servers: DashMap<String, Arc<Server>>,
    proxies: DashMap<String, Arc<Proxy>>,
    store: Arc<dyn GroupStore>,
    /// Held across each change and its save, so saves land in mutation order.
    server_group_writes: Mutex<()>,
    proxy_group_writes: Mutex<()>,
}

impl std::fmt::Debug for FleetState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FleetState")
            .field("server_groups", &self.server_groups.len())
            .field("proxy_groups", &self.proxy_groups.len())
            .field("servers", &self.servers.len())
            .field("proxies", &self.proxies.len())
            .finish()
    }
}

impl FleetState {
    /// Creates an empty fleet backed by `store`.
    pub fn new(store: Arc<dyn GroupStore>) -> Self {
        Self {
            server_groups: DashMap::new(),
            proxy_groups: DashMap::new(),
            servers: DashMap::new(),
            proxies: DashMap::new(),
            store,
            server_group_writes: Mutex::new(()),
            proxy_group_writes: Mutex::new(()),
        }
    }

    /// Creates a fleet pre-populated with the groups already in `store`.
    pub async fn load_from_store(store: Arc<dyn GroupStore>) -> Result<Self, StoreError> {
        let state = Self::new(store);
        for group in state.store.load_server_groups().await? {
            state.server_groups.insert(group.name().to_string(), group);
        }
        for mut group in state.store.load_proxy_groups().await? {
            group.normalize();
            state.proxy_groups.insert(group.name().to_string(), group);
        }
        info!(
            "🗂️ Fleet state ready: {} server groups, {} proxy groups",
            state.server_groups.len(),
            state.proxy_groups.len()
        );
        Ok(state)
    }

    /// Returns a copy of the named server group.
    pub fn find_server_group(&self, name: &str) -> Option<ServerGroup> {
        self.server_groups.get(name).map(|group| group.clone())
    }

    /// Returns a copy of the named proxy group.
    pub fn find_proxy_group(&self, name: &str) -> Option<ProxyGroup> {
        self.proxy_groups.get(name).map(|group| group.clone())
    }

    /// Looks up a registered server by identifier.
    pub fn find_server(&self, identifier: &str) -> Option<Arc<Server>> {
        self.servers.get(identifier).map(|server| Arc::clone(&server))
    }

    /// Looks up a registered proxy by identifier.
    pub fn find_proxy(&self, identifier: &str) -> Option<Arc<Proxy>> {
        self.proxies.get(identifier).map(|proxy| Arc::clone(&proxy))
    }

    /// Registers a new server group, rejecting duplicate names.
    ///
    /// Nothing is saved; see [`Self::create_server_group`].
    pub fn add_server_group(&self, group: ServerGroup) -> Result<(), RequestError> {
        match self.server_groups.entry(group.name().to_string()) {
            Entry::Occupied(entry) => Err(RequestError::GroupAlreadyExists(entry.key().clone())),
            Entry::Vacant(entry) => {
                debug!(group = group.name(), "server group added");
                entry.insert(group);
                Ok(())
            }
        }
    }

    /// Registers a new proxy group, rejecting duplicate names.
    pub fn add_proxy_group(&self, group: ProxyGroup) -> Result<(), RequestError> {
        match self.proxy_groups.entry(group.name().to_string()) {
            Entry::Occupied(entry) => Err(RequestError::GroupAlreadyExists(entry.key().clone())),
            Entry::Vacant(entry) => {
                debug!(group = group.name(), "proxy group added");
                entry.insert(group);
                Ok(())
            }
        }
    }

    /// Removes a server group from memory without saving.
    pub fn remove_server_group(&self, name: &str) -> Option<ServerGroup> {
        self.server_groups.remove(name).map(|(_, group)| group)
    }

    /// Removes a proxy group from memory without saving.
    pub fn remove_proxy_group(&self, name: &str) -> Option<ProxyGroup> {
        self.proxy_groups.remove(name).map(|(_, group)| group)
    }

    /// Adds a server group and saves the collection.
    ///
    /// If the save fails the group is taken out again, so a retry starts from
    /// the same state.
    pub async fn create_server_group(&self, group: ServerGroup) -> Result<(), RequestError> {
        let _writes = self.server_group_writes.lock().await;
        let name = group.name().to_string();
        self.add_server_group(group)?;
        let rollback = Rollback::new(|| {
            self.server_groups.remove(&name);
        });
        self.write_server_groups().await?;
        rollback.commit();
        Ok(())
    }

    /// Adds a proxy group and saves the collection, undoing the add on failure.
    pub async fn create_proxy_group(&self, group: ProxyGroup) -> Result<(), RequestError> {
        let _writes = self.proxy_group_writes.lock().await;
        let name = group.name().to_string();
        self.add_proxy_group(group)?;
        let rollback = Rollback::new(|| {
            self.proxy_groups.remove(&name);
        });
        self.write_proxy_groups().await?;
        rollback.commit();
        Ok(())
    }

    /// Applies `mutation` to the named server group and saves the collection.
    ///
    /// Returns `Ok(None)` if the group does not exist. If the save fails the
    /// group gets its previous value back.
    pub async fn modify_server_group<F>(
        &self,
        name: &str,
        mutation: F,
    ) -> Result<Option<ServerGroup>, StoreError>
    where
        F: FnOnce(&mut ServerGroup),
    {
        let _writes = self.server_group_writes.lock().await;
        let Some((previous, updated)) = self.server_groups.get_mut(name).map(|mut group| {
            let previous = group.value().clone();
            mutation(group.value_mut());
            (previous, group.value().clone())
        }) else {
            return Ok(None);
        };
        let rollback = Rollback::new(|| {
            self.server_groups.insert(name.to_string(), previous);
        });
        self.write_server_groups().await?;
        rollback.commit();
        Ok(Some(updated))
    }

    /// Applies `mutation` to the named proxy group and saves the collection.
    pub async fn modify_proxy_group<F>(
        &self,
        name: &str,
        mutation: F,
    ) -> Result<Option<ProxyGroup>, StoreError>
    where
        F: FnOnce(&mut ProxyGroup),
    {
        let _writes = self.proxy_group_writes.lock().await;
        let Some((previous, updated)) = self.proxy_groups.get_mut(name).map(|mut group| {
            let previous = group.value().clone();
            mutation(group.value_mut());
            (previous, group.value().clone())
        }) else {
            return Ok(None);
        };
        let rollback = Rollback::new(|| {
            self.proxy_groups.insert(name.to_string(), previous);
        });
        self.write_proxy_groups().await?;
        rollback.commit();
        Ok(Some(updated))
    }

    /// Removes the named server group and saves the collection.
    ///
    /// The group is put back if the save fails.
    pub async fn delete_server_group(&self, name: &str) -> Result<Option<ServerGroup>, StoreError> {
        let _writes = self.server_group_writes.lock().await;
        let Some(removed) = self.remove_server_group(name) else {
            return Ok(None);
        };
        let restore = removed.clone();
        let rollback = Rollback::new(|| {
            self.server_groups.insert(name.to_string(), restore);
        });
        self.write_server_groups().await?;
        rollback.commit();
        Ok(Some(removed))
    }

    /// Removes the named proxy group and saves the collection.
    pub async fn delete_proxy_group(&self, name: &str) -> Result<Option<ProxyGroup>, StoreError> {
        let _writes = self.proxy_group_writes.lock().await;
        let Some(removed) = self.remove_proxy_group(name) else {
            return Ok(None);
        };
        let restore = removed.clone();
        let rollback = Rollback::new(|| {
            self.proxy_groups.insert(name.to_string(), restore);
        });
        self.write_proxy_groups().await?;
        rollback.commit();
        Ok(Some(removed))
    }

    /// Registers a running server, replacing any stale handle with the same id.
    pub fn register_server(&self, server: Server) -> Arc<Server> {
        let server = Arc::new(server);
        let identifier = server.identifier().to_string();
        if self.servers.insert(identifier.clone(), Arc::clone(&server)).is_some() {
            debug!(server = %identifier, "replaced stale server handle");
        }
        server
    }

    /// Registers a running proxy, replacing any stale handle with the same id.
    pub fn register_proxy(&self, proxy: Proxy) -> Arc<Proxy> {
        let proxy = Arc::new(proxy);
        let identifier = proxy.identifier().to_string();
        if self.proxies.insert(identifier.clone(), Arc::clone(&proxy)).is_some() {
            debug!(proxy = %identifier, "replaced stale proxy handle");
        }
        proxy
    }

    /// Drops a server handle, typically once its process has exited.
    pub fn unregister_server(&self, identifier: &str) -> Option<Arc<Server>> {
        self.servers.remove(identifier).map(|(_, server)| server)
    }

    /// Drops a proxy handle.
    pub fn unregister_proxy(&self, identifier: &str) -> Option<Arc<Proxy>> {
        self.proxies.remove(identifier).map(|(_, proxy)| proxy)
    }

    /// All server groups, sorted by name.
    pub fn server_groups(&self) -> Vec<ServerGroup> {
        let mut groups: Vec<ServerGroup> = self
            .server_groups
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        groups.sort_by(|a, b| a.name().cmp(b.name()));
        groups
    }

    /// All proxy groups, sorted by name.
    pub fn proxy_groups(&self) -> Vec<ProxyGroup> {
        let mut groups: Vec<ProxyGroup> = self
            .proxy_groups
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        groups.sort_by(|a, b| a.name().cmp(b.name()));
        groups
    }

    /// Number of registered servers.
    pub fn server_count(&self) -> usize {
        self.servers.len()
    }

    /// Number of registered proxies.
    pub fn proxy_count(&self) -> usize {
        self.proxies.len()
    }

    /// Writes the whole server-group collection to the store.
    pub async fn persist_server_groups(&self) -> Result<(), StoreError> {
        let _writes = self.server_group_writes.lock().await;
        self.write_server_groups().await
    }

    /// Writes the whole proxy-group collection to the store.
    pub async fn persist_proxy_groups(&self) -> Result<(), StoreError> {
        let _writes = self.proxy_group_writes.lock().await;
        self.write_proxy_groups().await
    }

    // Callers hold the matching write lock.
    async fn write_server_groups(&self) -> Result<(), StoreError> {
        let snapshot = self.server_groups();
        self.store.save_server_groups(&snapshot).await
    }

    async fn write_proxy_groups(&self) -> Result<(), StoreError> {
        let snapshot = self.proxy_groups();
        self.store.save_proxy_groups(&snapshot).await
    }
}

/// Undoes an in-memory change when dropped, unless [`Rollback::commit`] ran.
///
/// Dropping on an early `?` return or while unwinding from a panicking store
/// both restore the previous state.
#[must_use = "dropping the guard undoes the change"]
struct Rollback<F: FnOnce()> {
    undo: Option<F>,
}

impl<F: FnOnce()> Rollback<F> {
    fn new(undo: F) -> Self {
        Self { undo: Some(undo) }
    }

    fn commit(mut self) {
        self.undo = None;
    }
}

impl<F: FnOnce()> Drop for Rollback<F> {
    fn drop(&mut self) {
        if let Some(undo) = self.undo.take() {
            undo();
        }
    }
}
