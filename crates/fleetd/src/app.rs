//! Daemon lifecycle: startup, monitoring and graceful shutdown.

use crate::cli::CliArgs;
use crate::config::AppConfig;
use crate::logging::display_banner;
use crate::signals::{wait_for_shutdown_signal, wait_for_shutdown_signal_silent};
use fleet_control::{create_server_with_config, open_fleet, ControlServer, DispatchStats, FleetState};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const MONITOR_INTERVAL: Duration = Duration::from_secs(60);
const SERVER_STOP_TIMEOUT: Duration = Duration::from_secs(8);

/// The running daemon.
///
/// Owns the merged configuration and the control server built from it.
pub struct Application {
    config: AppConfig,
    config_path: PathBuf,
    server: ControlServer,
}

impl Application {
    /// Creates a new application instance.
    ///
    /// # Process
    ///
    /// 1. Load configuration from file (creating default if missing)
    /// 2. Apply command-line argument overrides
    /// 3. Validate merged configuration
    /// 4. Load persisted groups from the data directory
    /// 5. Build the control server
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        info!("🔧 Loading configuration from: {}", args.config_path.display());
        let mut config = AppConfig::load_from_file(&args.config_path).await?;
        config.apply_cli_overrides(&args);

        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        }
        info!("✅ Configuration loaded and validated successfully");

        display_banner();

        let control_config = config.to_control_config()?;
        let fleet = open_fleet(&control_config).await?;
        let server = create_server_with_config(control_config, fleet);

        Ok(Self {
            config,
            config_path: args.config_path,
            server,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn fleet(&self) -> &Arc<FleetState> {
        self.server.dispatcher().state()
    }

    /// Runs until SIGINT or SIGTERM. A second signal exits immediately.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        self.run_until(async {
            if let Err(e) = wait_for_shutdown_signal().await {
                error!("❌ Failed to listen for shutdown signals: {e}");
                return;
            }

            tokio::spawn(async {
                if let Err(e) = wait_for_shutdown_signal_silent().await {
                    error!("Failed to set up forced shutdown signal handler: {e}");
                    return;
                }
                warn!("Shutdown signal received again, exiting now");
                std::process::exit(1);
            });
        })
        .await
    }

    /// Serves requests until `shutdown` completes, then stops the server.
    pub async fn run_until<S>(self, shutdown: S) -> Result<(), Box<dyn std::error::Error>>
    where
        S: Future<Output = ()>,
    {
        info!("🌟 Starting fleet control daemon");
        self.log_configuration_summary();

        let listener = self.server.bind().await?;
        let local_addr = listener.local_addr()?;
        let fleet = self.fleet().clone();
        let stats = self.server.dispatcher().stats().clone();

        info!(
            "📊 Initial fleet state: {} server groups | {} proxy groups",
            fleet.server_groups().len(),
            fleet.proxy_groups().len()
        );

        let server = Arc::new(self.server);
        let mut server_handle = {
            let server = server.clone();
            tokio::spawn(async move { server.serve(listener).await })
        };

        let monitoring_handle = {
            let stats = stats.clone();
            let fleet = fleet.clone();
            let server = server.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(MONITOR_INTERVAL);
                interval.tick().await;
                let mut last_requests = 0u64;

                loop {
                    interval.tick().await;
                    let snapshot = stats.snapshot();
                    let requests_this_period = snapshot.requests - last_requests;
                    last_requests = snapshot.requests;

                    info!(
                        "📊 Control plane health - {} requests/min | {} failed total | {} connections | {} servers | {} proxies",
                        requests_this_period,
                        snapshot.total_failures(),
                        server.connections().count().await,
                        fleet.server_count(),
                        fleet.proxy_count()
                    );
                }
            })
        };

        info!("✅ Fleet control daemon is running on {}", local_addr);
        info!("🔍 Health monitoring active - stats every {} seconds", MONITOR_INTERVAL.as_secs());
        info!("🛑 Press Ctrl+C to gracefully shutdown");

        let server_result = tokio::select! {
            _ = shutdown => None,
            finished = &mut server_handle => Some(finished),
        };

        monitoring_handle.abort();

        if let Some(finished) = server_result {
            // The accept loop only returns early on a listener failure.
            log_final_statistics(&stats, &fleet);
            return match finished {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e.into()),
                Err(e) => Err(format!("Server task failed: {e}").into()),
            };
        }

        info!("🛑 Shutdown requested, stopping control server...");
        server.shutdown();

        match tokio::time::timeout(SERVER_STOP_TIMEOUT, server_handle).await {
            Ok(Ok(Ok(()))) => info!("✅ Control server stopped gracefully"),
            Ok(Ok(Err(e))) => error!("❌ Control server error during shutdown: {}", e),
            Ok(Err(e)) => error!("❌ Control server task failed: {}", e),
            Err(_) => warn!("⏰ Control server did not stop within {}s", SERVER_STOP_TIMEOUT.as_secs()),
        }

        log_final_statistics(&stats, &fleet);
        info!("✅ Fleet control daemon shutdown complete");
        Ok(())
    }

    fn log_configuration_summary(&self) {
        info!("📋 Configuration Summary:");
        info!("  📂 Config file: {}", self.config_path.display());
        info!("  🌐 Bind address: {}", self.config.server.bind_address);
        info!("  🗄️ Data directory: {}", self.config.storage.data_directory);
        info!("  👥 Max connections: {}", self.config.server.max_connections);
        info!("  ⏱️ Connection timeout: {}s", self.config.server.connection_timeout);
        info!("  📦 Max message size: {} bytes", self.config.security.max_message_size);
    }
}

fn log_final_statistics(stats: &DispatchStats, fleet: &FleetState) {
    let snapshot = stats.snapshot();
    info!("📊 Final Statistics:");
    info!("  - Uptime: {}s", snapshot.uptime_seconds);
    info!("  - Requests handled: {}", snapshot.requests);
    info!("  - Successful: {}", snapshot.successes);
    for (code, count) in &snapshot.failures {
        info!("  - Failed with code {}: {}", code, count);
    }
    info!(
        "  - Groups: {} server, {} proxy",
        fleet.server_groups().len(),
        fleet.proxy_groups().len()
    );
}
