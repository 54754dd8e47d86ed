use anyhow::{Context, Result};
use clap::Parser;
use rmcp::{ServiceExt, transport::stdio};
use spotify_mcp::{
    adapters::server::SpotifyServer,
    app::{catalog::Catalog, registry::ToolRegistry},
    infra::{config::AppConfig, metrics, spotify::SpotifyClient},
};
use std::{path::PathBuf, sync::Arc};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Parser)]
#[command(name = "spotify-mcp", version, about = "Spotify Web API tools over MCP stdio")]
struct Cli {
    /// Directory holding default/<profile>/local TOML overlays (overrides APP_CONFIG_DIR)
    #[arg(long, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    /// Print the advertised tool list as JSON and exit
    #[arg(long)]
    list_tools: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _ = dotenvy::dotenv();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off"));
    // IMPORTANT: write logs to stderr; stdout must remain clear for MCP JSON-RPC
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let config = AppConfig::load_with_dir(cli.config_dir.as_deref())?;
    let client = SpotifyClient::new(config.api_base_url(), config.user_agent.as_deref())
        .context("build Spotify HTTP client")?;
    let catalog = Catalog::builtin().context("load tool catalog")?;
    let registry = ToolRegistry::from_catalog(&catalog, Arc::new(client))
        .context("bind tool catalog")?;
    let handler = SpotifyServer::new(Arc::new(registry));

    if cli.list_tools {
        let tools = serde_json::to_string_pretty(&handler.advertised_tools())
            .context("encode tool list")?;
        println!("{tools}");
        return Ok(());
    }

    if let Some(metrics_cfg) = config.metrics_server_config()? {
        if metrics_cfg.auth_token.is_none() {
            tracing::warn!(
                addr = %metrics_cfg.addr,
                "metrics auth token missing; set METRICS_AUTH_TOKEN to protect /metrics"
            );
        }
        metrics::spawn_metrics_server(metrics_cfg).await;
    }

    tracing::info!(
        base_url = config.api_base_url(),
        tools = catalog.len(),
        "spotify-mcp serving on stdio"
    );
    let server = handler.serve(stdio()).await?;
    server.waiting().await?;
    Ok(())
}
