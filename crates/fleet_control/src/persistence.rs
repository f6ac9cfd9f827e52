//! Durable write-back of group definitions.
//!
//! The dispatcher only ever sees the [`GroupStore`] trait. Each save replaces
//! the whole collection for one group class.

use crate::error::StoreError;
use crate::state::{ProxyGroup, ServerGroup};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::{debug, info};

const SERVER_GROUPS_FILE: &str = "serverGroups.json";
const PROXY_GROUPS_FILE: &str = "proxyGroups.json";

/// Backend that stores group collections.
#[async_trait]
pub trait GroupStore: Send + Sync {
    async fn load_server_groups(&self) -> Result<Vec<ServerGroup>, StoreError>;

    async fn load_proxy_groups(&self) -> Result<Vec<ProxyGroup>, StoreError>;

    async fn save_server_groups(&self, groups: &[ServerGroup]) -> Result<(), StoreError>;

    async fn save_proxy_groups(&self, groups: &[ProxyGroup]) -> Result<(), StoreError>;
}

/// Stores each group class as a JSON array in a data directory.
///
/// Writes go to a temporary sibling file which is then renamed over the
/// target, so a crash mid-write never leaves a truncated collection behind.
#[derive(Debug, Clone)]
pub struct JsonGroupStore {
    directory: PathBuf,
}

impl JsonGroupStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    async fn read<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>, StoreError> {
        let path = self.directory.join(file);
        if !tokio::fs::try_exists(&path).await? {
            debug!("No {} found, starting with an empty collection", path.display());
            return Ok(Vec::new());
        }
        let content = tokio::fs::read(&path).await?;
        let groups = serde_json::from_slice(&content)?;
        Ok(groups)
    }

    async fn write<T: Serialize>(&self, file: &str, groups: &[T]) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.directory).await?;
        let path = self.directory.join(file);
        let temp_path = self.directory.join(format!("{file}.tmp"));
        let content = serde_json::to_vec_pretty(groups)?;
        tokio::fs::write(&temp_path, content).await?;
        tokio::fs::rename(&temp_path, &path).await?;
        debug!("Saved {} groups to {}", groups.len(), path.display());
        Ok(())
    }
}

#[async_trait]
impl GroupStore for JsonGroupStore {
    async fn load_server_groups(&self) -> Result<Vec<ServerGroup>, StoreError> {
        let groups: Vec<ServerGroup> = self.read(SERVER_GROUPS_FILE).await?;
        info!("📂 Loaded {} server groups from {}", groups.len(), self.directory.display());
        Ok(groups)
    }

    async fn load_proxy_groups(&self) -> Result<Vec<ProxyGroup>, StoreError> {
        let groups: Vec<ProxyGroup> = self.read(PROXY_GROUPS_FILE).await?;
        info!("📂 Loaded {} proxy groups from {}", groups.len(), self.directory.display());
        Ok(groups)
    }

    async fn save_server_groups(&self, groups: &[ServerGroup]) -> Result<(), StoreError> {
        self.write(SERVER_GROUPS_FILE, groups).await
    }

    async fn save_proxy_groups(&self, groups: &[ProxyGroup]) -> Result<(), StoreError> {
        self.write(PROXY_GROUPS_FILE, groups).await
    }
}

/// In-memory store that remembers the last saved collections.
///
/// Used by embedders that do not need durability and by tests, which can also
/// make saves fail on demand.
#[derive(Debug, Default)]
pub struct MemoryGroupStore {
    server_groups: Mutex<Vec<ServerGroup>>,
    proxy_groups: Mutex<Vec<ProxyGroup>>,
    server_saves: AtomicUsize,
    proxy_saves: AtomicUsize,
    fail_saves: AtomicBool,
}

impl MemoryGroupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with collections returned by the load calls.
    pub fn with_groups(server_groups: Vec<ServerGroup>, proxy_groups: Vec<ProxyGroup>) -> Self {
        Self {
            server_groups: Mutex::new(server_groups),
            proxy_groups: Mutex::new(proxy_groups),
            ..Self::default()
        }
    }

    pub fn server_saves(&self) -> usize {
        self.server_saves.load(Ordering::SeqCst)
    }

    pub fn proxy_saves(&self) -> usize {
        self.proxy_saves.load(Ordering::SeqCst)
    }

    pub fn saved_server_groups(&self) -> Vec<ServerGroup> {
        lock(&self.server_groups).clone()
    }

    pub fn saved_proxy_groups(&self) -> Vec<ProxyGroup> {
        lock(&self.proxy_groups).clone()
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    fn check_failure(&self) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "store is failing saves",
            )));
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl GroupStore for MemoryGroupStore {
    async fn load_server_groups(&self) -> Result<Vec<ServerGroup>, StoreError> {
        Ok(self.saved_server_groups())
    }

    async fn load_proxy_groups(&self) -> Result<Vec<ProxyGroup>, StoreError> {
        Ok(self.saved_proxy_groups())
    }

    async fn save_server_groups(&self, groups: &[ServerGroup]) -> Result<(), StoreError> {
        self.check_failure()?;
        *lock(&self.server_groups) = groups.to_vec();
        self.server_saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn save_proxy_groups(&self, groups: &[ProxyGroup]) -> Result<(), StoreError> {
        self.check_failure()?;
        *lock(&self.proxy_groups) = groups.to_vec();
        self.proxy_saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
