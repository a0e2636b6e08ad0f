//! Gatekeeper entry point.
//!
//! Loads configuration, sets up logging, loads the compiled-in plugins into
//! a frozen event bus and runs the server until a termination signal or a
//! plugin-requested shutdown.

mod cli;
mod config;
mod logging;
mod signals;

use anyhow::{anyhow, Context};
use cli::CliArgs;
use config::AppConfig;
use gate_event_system::{EventBusBuilder, GatePlugin};
use gate_server::GateServer;
use plugin_commands::CommandsPlugin;
use plugin_system::PluginManager;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Every plugin compiled into the binary.
fn available_plugins() -> Vec<Box<dyn GatePlugin>> {
    vec![Box::new(CommandsPlugin::new())]
}

/// Main application struct.
pub struct Application {
    config: AppConfig,
    server: Arc<GateServer>,
}

impl Application {
    /// Loads configuration, applies CLI overrides and builds the server.
    pub async fn new(args: CliArgs) -> anyhow::Result<Self> {
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        if let Some(bind_address) = args.bind_address {
            config.server.bind_address = bind_address;
        }
        if let Some(max_players) = args.max_players {
            config.server.max_players = max_players;
        }
        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }
        if args.debug {
            config.server.debug = true;
            config.logging.level = "debug".to_string();
        }
        if args.json_logs {
            config.logging.json_format = true;
        }

        config
            .validate()
            .map_err(|e| anyhow!("Configuration validation failed: {}", e))?;

        logging::setup_logging(&config.logging)?;
        display_banner();
        info!("📂 Config: {}", args.config_path.display());

        let mut events = EventBusBuilder::new();
        gate_server::register_core_handlers(&mut events)?;

        let mut plugin_manager =
            PluginManager::new(events).with_whitelist(config.plugins.whitelist.clone());
        let summary = plugin_manager.load_all(&available_plugins());
        for (name, e) in &summary.failed {
            error!("❌ Plugin {} failed to load: {}", name, e);
        }
        if !summary.skipped.is_empty() {
            info!("⏭️ Skipped plugin(s) not on the whitelist: {:?}", summary.skipped);
        }
        if summary.loaded.is_empty() {
            info!("📭 No plugins loaded");
        } else {
            info!(
                "🎉 Successfully loaded {} plugin(s): {:?}",
                summary.loaded.len(),
                summary.loaded
            );
        }

        let server_config = config.to_server_config()?;
        let server = GateServer::new(server_config, plugin_manager.into_event_bus())?;

        Ok(Self {
            config,
            server: Arc::new(server),
        })
    }

    /// Runs the server until a signal or a plugin asks it to stop.
    pub async fn run(self) -> anyhow::Result<()> {
        info!("📋 Configuration Summary:");
        info!("  🌐 Bind address: {}", self.config.server.bind_address);
        info!("  👥 Max players: {}", self.config.server.max_players);
        info!("  🔗 Max connections: {}", self.config.server.max_connections);
        info!(
            "  🗜️ Compression threshold: {}",
            self.config.server.compression_threshold
        );

        let serving = self.server.clone();
        let mut server_handle = tokio::spawn(async move { serving.start().await });

        info!("🛑 Press Ctrl+C to gracefully shutdown");

        let outcome = tokio::select! {
            signal = signals::wait_for_shutdown_signal() => {
                match signal {
                    Ok(name) => info!("📡 Received {}, initiating graceful shutdown...", name),
                    Err(e) => warn!("Signal handling failed ({}), shutting down", e),
                }
                self.server.shutdown();
                server_handle.await
            }
            finished = &mut server_handle => finished,
        };

        outcome
            .context("server task panicked")?
            .context("server stopped with an error")?;

        info!("✅ Gatekeeper shutdown complete");
        Ok(())
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let args = CliArgs::parse();

    let app = match Application::new(args).await {
        Ok(app) => app,
        Err(e) => {
            eprintln!("❌ Failed to start application: {:#}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = app.run().await {
        error!("❌ Application error: {:#}", e);
        std::process::exit(1);
    }
}

/// Display startup banner using proper logging
fn display_banner() {
    let version = env!("CARGO_PKG_VERSION");
    info!("╔══════════════════════════════════════════╗");
    info!("║             🛡️  GATEKEEPER  🛡️             ║");
    info!("║                  v{:<8}               ║", version);
    info!("║                                          ║");
    info!("║  Minecraft 1.8 - 1.12.2 verification     ║");
    info!("║  lobby with an event-driven plugin bus   ║");
    info!("╚══════════════════════════════════════════╝");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_available_plugins_have_unique_names() {
        let plugins = available_plugins();
        let mut names: Vec<&str> = plugins.iter().map(|p| p.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), plugins.len());
    }

    #[test]
    fn test_whitelist_filters_plugins() {
        let mut manager = PluginManager::new(EventBusBuilder::new()).with_whitelist(["other"]);
        let summary = manager.load_all(&available_plugins());
        assert!(summary.loaded.is_empty());
        assert_eq!(summary.skipped, vec!["commands".to_string()]);
    }

    #[tokio::test]
    async fn test_application_rejects_invalid_override() {
        let dir = TempDir::new().unwrap();
        let args = CliArgs {
            config_path: dir.path().join("gatekeeper.toml"),
            bind_address: Some("not an address".to_string()),
            log_level: None,
            json_logs: false,
            debug: false,
            max_players: None,
        };
        assert!(Application::new(args).await.is_err());
    }
}
