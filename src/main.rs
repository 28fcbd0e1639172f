//! RIP server - main entry point
//!
//! Loads the configuration, wires the simulated device driver into a
//! [`RipServer`] and serves the RIP endpoints over HTTP until Ctrl-C.

use anyhow::Context;
use clap::Parser;
use rip_server::{
    http_transport::HttpTransport,
    logging::{init_logging, LogConfig},
    RipServer, ServerConfig, SimulatedDriver,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// RIP server configuration
#[derive(Parser, Debug)]
#[command(name = "rip-server")]
#[command(about = "Remote Interface Protocol server for remote laboratories")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file (TOML or JSON); built-in generic server if absent
    #[arg(short, long, env = "RIP_CONFIG")]
    config: Option<PathBuf>,

    /// Override the configured host
    #[arg(long, env = "RIP_HOST")]
    host: Option<String>,

    /// Override the configured port
    #[arg(short, long, env = "RIP_PORT")]
    port: Option<u16>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<ServerConfig> {
        let config = match &self.config {
            Some(path) => ServerConfig::load_from_file(path)
                .with_context(|| format!("Invalid configuration {}", path.display()))?,
            None => {
                info!("No configuration file given, using the generic server");
                ServerConfig::default()
            }
        };
        Ok(config.with_address(self.host.clone(), self.port))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(LogConfig::from_env().with_debug(cli.debug))
        .context("Failed to initialize logging")?;

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{e:#}");
            return Err(e);
        }
    };
    info!(
        name = %config.identity.name,
        readables = config.registry.readables().len(),
        writables = config.registry.writables().len(),
        "Configuration loaded"
    );

    let driver = Arc::new(SimulatedDriver::new(&config.registry));
    let server = Arc::new(RipServer::new(config, driver));
    server.start();

    let shutdown_server = server.clone();
    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {e}");
        }
        info!("Shutdown requested");
        shutdown_server.stop();
    };

    HttpTransport::new(server.clone())
        .bind_and_serve(shutdown)
        .await
        .context("HTTP server failed")?;

    server.stop();
    info!("RIP server exited");
    Ok(())
}
