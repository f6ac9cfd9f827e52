//! Core control server implementation.
//!
//! `ControlServer` accepts TCP connections, upgrades them to WebSocket and
//! hands every inbound frame to a shared [`RequestDispatcher`]. It contains no
//! request semantics of its own.

use super::connections::ConnectionRegistry;
use super::handlers::handle_connection;
use crate::config::ControlConfig;
use crate::error::ServerError;
use crate::messaging::RequestDispatcher;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// The control-plane server.
pub struct ControlServer {
    /// Server configuration settings
    config: ControlConfig,

    /// Shared dispatcher; cloned into every connection task
    dispatcher: RequestDispatcher,

    /// Live connections, bounded by `max_connections`
    connections: Arc<ConnectionRegistry>,

    /// Channel for coordinating server shutdown
    shutdown_sender: broadcast::Sender<()>,
}

impl ControlServer {
    /// Creates a server that routes requests through `dispatcher`.
    pub fn new(config: ControlConfig, dispatcher: RequestDispatcher) -> Self {
        let (shutdown_sender, _) = broadcast::channel(1);
        let connections = Arc::new(ConnectionRegistry::new(config.max_connections));
        Self {
            config,
            dispatcher,
            connections,
            shutdown_sender,
        }
    }

    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &RequestDispatcher {
        &self.dispatcher
    }

    pub fn connections(&self) -> &Arc<ConnectionRegistry> {
        &self.connections
    }

    /// Binds the configured address.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        TcpListener::bind(self.config.bind_address)
            .await
            .map_err(|e| ServerError::Network(format!("Failed to bind {}: {e}", self.config.bind_address)))
    }

    /// Binds the configured address and serves until [`Self::shutdown`].
    pub async fn start(&self) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Serves connections from an already bound listener until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::Network(e.to_string()))?;
        info!("🚀 Control server listening on {}", local_addr);

        let mut shutdown_receiver = self.shutdown_sender.subscribe();
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => self.accept(stream, addr).await,
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        return Err(ServerError::Network(e.to_string()));
                    }
                },
                _ = shutdown_receiver.recv() => {
                    info!("🛑 Control server stopping - shutdown initiated");
                    break;
                }
            }
        }

        info!("✅ Control server stopped");
        Ok(())
    }

    async fn accept(&self, stream: tokio::net::TcpStream, addr: SocketAddr) {
        if let Err(e) = self.dispatcher.guard().validate_connection(addr.ip()) {
            warn!("🚫 Refused control connection from {}: {}", addr, e);
            return;
        }
        let Some(connection_id) = self.connections.try_add(addr).await else {
            warn!(
                "🚫 Refused control connection from {}: limit of {} reached",
                addr, self.config.max_connections
            );
            return;
        };

        let dispatcher = self.dispatcher.clone();
        let registry = self.connections.clone();
        let shutdown = self.shutdown_sender.subscribe();
        let idle_timeout = (self.config.connection_timeout > 0)
            .then(|| Duration::from_secs(self.config.connection_timeout));

        tokio::spawn(async move {
            if let Err(e) =
                handle_connection(stream, connection_id, dispatcher, registry, idle_timeout, shutdown).await
            {
                debug!("Connection {} ended with error: {}", connection_id, e);
            }
        });
    }

    /// Stops accepting connections and closes the open ones.
    pub fn shutdown(&self) {
        // No receivers just means nothing is running yet.
        let _ = self.shutdown_sender.send(());
    }
}
