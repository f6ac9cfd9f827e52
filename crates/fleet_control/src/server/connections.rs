//! Registry of open control connections.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// Address assigned to each control connection; replies go back to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct ConnectionInfo {
    remote_addr: SocketAddr,
    connected_at: Instant,
}

/// Tracks live connections so the server can enforce its connection limit.
#[derive(Debug)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, ConnectionInfo>>,
    max_connections: usize,
}

impl ConnectionRegistry {
    pub fn new(max_connections: usize) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            max_connections,
        }
    }

    /// Registers a connection, or returns `None` when the registry is full.
    pub async fn try_add(&self, remote_addr: SocketAddr) -> Option<ConnectionId> {
        let mut connections = self.connections.write().await;
        if connections.len() >= self.max_connections {
            return None;
        }
        let connection_id = ConnectionId::new();
        connections.insert(
            connection_id,
            ConnectionInfo {
                remote_addr,
                connected_at: Instant::now(),
            },
        );
        info!("🔗 Control connection {} opened from {}", connection_id, remote_addr);
        Some(connection_id)
    }

    pub async fn remove(&self, connection_id: ConnectionId) {
        if let Some(info) = self.connections.write().await.remove(&connection_id) {
            info!(
                "👋 Control connection {} from {} closed after {:.1}s",
                connection_id,
                info.remote_addr,
                info.connected_at.elapsed().as_secs_f64()
            );
        }
    }

    pub async fn remote_addr(&self, connection_id: ConnectionId) -> Option<SocketAddr> {
        self.connections
            .read()
            .await
            .get(&connection_id)
            .map(|info| info.remote_addr)
    }

    pub async fn count(&self) -> usize {
        self.connections.read().await.len()
    }
}
