//! market-bridge service entry point.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use bridge_common::logging::init_from_config;
use bridge_common::{CliOverrides, Config, LoadedConfig};
use market_bridge::names::SymbolNameMap;
use market_bridge::BridgeService;

/// REST bridge over A-share and global market-data providers.
#[derive(Debug, Parser)]
#[command(name = "market-bridge", version, about)]
struct Cli {
    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,

    /// Address to bind
    #[arg(long)]
    host: Option<String>,

    /// Configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Symbol name map (JSON object of ticker to name)
    #[arg(long)]
    names: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let startup_start = std::time::Instant::now();
    let cli = Cli::parse();

    let overrides = CliOverrides {
        host: cli.host,
        port: cli.port,
        name_map_path: cli.names,
    };
    let LoadedConfig { config, ignored } =
        Config::load_with_env(cli.config.as_deref(), &overrides)?;

    init_from_config(&config.observability);
    for message in &ignored {
        tracing::warn!("{}", message);
    }

    tracing::info!("Market Bridge v{}", env!("CARGO_PKG_VERSION"));

    let names = SymbolNameMap::load(&config.market.name_map_path).with_context(|| {
        format!(
            "Failed to load name map from {}",
            config.market.name_map_path.display()
        )
    })?;
    tracing::info!(entries = names.len(), "Loaded symbol name map");

    let service = BridgeService::new(config, names);

    let startup_duration = startup_start.elapsed();
    tracing::info!(
        duration_ms = startup_duration.as_millis() as u64,
        "Service initialized in {:?}",
        startup_duration
    );

    service.start().await
}
