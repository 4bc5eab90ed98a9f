mod server;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use hlsrelay_api::{create_router, AppState};
use hlsrelay_core::{load_config, logging};

use server::RelayServer;

/// CORS-aware HLS relay
#[derive(Debug, Parser)]
#[command(name = "hlsrelay", version, about)]
struct Args {
    /// Path to a YAML/TOML/JSON config file
    #[arg(long, short, env = "HLSRELAY_CONFIG_PATH")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1. Load and validate configuration
    let config = load_config(args.config.as_deref())?;

    // 2. Initialize logging
    logging::init_logging(&config.logging)?;
    info!("HLS relay starting...");
    info!("HTTP address: {}", config.http_address());
    info!(
        max_concurrent_fetches = config.proxy.max_concurrent_fetches,
        require_terms_accepted = config.proxy.require_terms_accepted,
        upstream_policy = ?config.proxy.upstream_policy,
        "Relay settings"
    );

    // 3. Build shared state and router
    let state = AppState::from_config(&config)?;
    info!(
        "Allowed origins: {} configured",
        state.allowed_origins.len()
    );
    let router = create_router(state);

    // 4. Serve until a shutdown signal arrives
    RelayServer::new(config.http_address(), router).run().await?;

    info!("HLS relay stopped");
    Ok(())
}
