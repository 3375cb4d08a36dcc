//! Ad Library MCP Server
//!
//! Run with: adlib-mcp --scrapecreators-api-key xxx [--cache-dir /path/to/cache]

use std::path::PathBuf;
use std::sync::Arc;

use adlib_api_client::{MediaFetcher, ScrapeCreatorsClient};
use adlib_core::Config;
use adlib_infra::{init_telemetry, TelemetryOptions};
use adlib_mcp::{AdLibraryHandlers, AdLibraryService};
use adlib_services::{CleanupService, MediaCacheService};
use anyhow::Context;
use clap::Parser;
use rmcp::service::ServiceExt;
use rmcp::transport::io::stdio;

#[derive(Parser)]
#[command(name = "adlib-mcp")]
#[command(about = "MCP server for Meta Ad Library research", long_about = None)]
#[command(version)]
struct Args {
    /// ScrapeCreators API key used for ad-library lookups
    #[arg(long, env = "SCRAPECREATORS_API_KEY", hide_env_values = true)]
    scrapecreators_api_key: Option<String>,

    /// Cache root holding index.db and the media directory
    #[arg(long, env = "ADLIB_CACHE_DIR")]
    cache_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut config = Config::from_env().context("Failed to load configuration")?;
    let args = Args::parse();

    if let Some(key) = args.scrapecreators_api_key.filter(|k| !k.trim().is_empty()) {
        config.scrapecreators_mut().api_key = Some(key);
    }
    if let Some(dir) = args.cache_dir {
        config.cache_mut().cache_dir = dir;
    }
    config.validate().context("Invalid configuration")?;

    init_telemetry(&TelemetryOptions::from_config("adlib-mcp", &config))
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    let cache = Arc::new(
        MediaCacheService::open(config.cache().clone())
            .await
            .context("Failed to open media cache")?,
    );

    let cleanup = Arc::new(CleanupService::new(cache.clone(), config.cache()));
    let cleanup_handle = cleanup.start();

    let ad_library = match ScrapeCreatorsClient::from_config(config.scrapecreators()) {
        Ok(client) => Some(client),
        Err(e) => {
            tracing::warn!(error = %e, "Ad-library tools disabled");
            None
        }
    };
    let fetcher = MediaFetcher::from_config(config.scrapecreators())?;

    let handlers = AdLibraryHandlers::new(cache, ad_library, fetcher);
    let service = AdLibraryService::new(handlers, config.is_production());

    tracing::info!("Serving MCP over stdio");
    let running = service.serve(stdio()).await.context("MCP transport failed")?;
    running.waiting().await.context("MCP server error")?;

    if let Some(handle) = cleanup_handle {
        handle.abort();
    }

    Ok(())
}
