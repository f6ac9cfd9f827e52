//! # fleetd - Fleet Control Daemon
//!
//! Hosts the fleet control plane: loads persisted server and proxy groups,
//! serves the WebSocket request channel and shuts down cleanly on signals.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run with default configuration
//! fleetd
//!
//! # Specify custom configuration
//! fleetd --config production.toml
//!
//! # Override specific settings
//! fleetd --bind 0.0.0.0:5123 --data-dir /var/lib/fleet --log-level debug
//!
//! # JSON logging for production
//! fleetd --json-logs
//! ```
//!
//! ## Configuration
//!
//! The daemon loads configuration from a TOML file (default: `config.toml`).
//! If the file doesn't exist, a default configuration will be created.
//!
//! ## Signal Handling
//!
//! SIGINT and SIGTERM stop the daemon gracefully; a second signal exits
//! immediately.

use tracing::error;

mod app;
mod cli;
mod config;
mod logging;
mod signals;

pub use app::Application;
pub use cli::CliArgs;
pub use config::AppConfig;

/// Entry point called from `main`.
///
/// # Exit Codes
///
/// * **0**: Successful execution and shutdown
/// * **1**: Error during startup, configuration, or runtime
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Logging settings come from the file before the full config is validated.
    let mut config = AppConfig::load_from_file(&args.config_path)
        .await
        .unwrap_or_default();
    config.apply_cli_overrides(&args);

    if let Err(e) = logging::setup_logging(&config.logging, args.json_logs) {
        eprintln!("❌ Failed to setup logging: {e}");
        std::process::exit(1);
    }

    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {:?}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("❌ Failed to start application: {e:?}");
            std::process::exit(1);
        }
    }

    Ok(())
}

pub use config::{LoggingSettings, ServerSettings, StorageSettings};
