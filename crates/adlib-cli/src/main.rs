//! adlib: operator CLI for the local ad media cache.
//!
//! Reads the same ADLIB_* environment as the MCP server.

use std::path::PathBuf;

use adlib_cli::{init_tracing, render_eviction, render_media_table, render_stats_table};
use adlib_core::models::{MediaKind, SearchFilters};
use adlib_core::Config;
use adlib_services::MediaCacheService;
use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "adlib", about = "Ad media cache CLI")]
struct Cli {
    /// Cache root holding index.db and the media directory
    #[arg(long, global = true, env = "ADLIB_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Table,
}

#[derive(Subcommand)]
enum Commands {
    /// Show cache statistics
    Stats {
        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// Search cached media
    Search {
        /// Exact brand name
        #[arg(long)]
        brand: Option<String>,
        /// Only media with (true) or without (false) people
        #[arg(long)]
        has_people: Option<bool>,
        /// Substring of the dominant colors
        #[arg(long)]
        color: Option<String>,
        /// image or video
        #[arg(long)]
        kind: Option<MediaKind>,
        /// Maximum number of results
        #[arg(long)]
        limit: Option<u32>,
        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// Look up a single URL in the cache
    Lookup {
        /// Source URL of the media
        url: String,
    },
    /// Remove media downloaded this many days ago or earlier
    Evict {
        #[arg(long)]
        max_age_days: Option<u32>,
        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// Delete blob files that no index entry references
    Sweep,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let mut config = Config::from_env().context("Failed to load configuration")?;
    let cli = Cli::parse();
    if let Some(dir) = cli.cache_dir {
        config.cache_mut().cache_dir = dir;
    }

    let cache = MediaCacheService::open(config.cache().clone())
        .await
        .with_context(|| {
            format!(
                "Failed to open media cache at {}",
                config.cache().cache_dir.display()
            )
        })?;

    match cli.command {
        Commands::Stats { format } => {
            let stats = cache.statistics().await?;
            match format {
                OutputFormat::Json => print_json(&stats)?,
                OutputFormat::Table => {
                    print!("{}", render_stats_table(&stats, &config.cache().cache_dir))
                }
            }
        }
        Commands::Search {
            brand,
            has_people,
            color,
            kind,
            limit,
            format,
        } => {
            let filters = SearchFilters {
                brand_name: brand,
                has_people,
                color_contains: color,
                media_kind: kind,
                limit: Some(limit.unwrap_or(config.cache().default_search_limit)),
            };
            let results = cache.search(&filters).await?;
            match format {
                OutputFormat::Json => print_json(&results)?,
                OutputFormat::Table => print!("{}", render_media_table(&results)),
            }
        }
        Commands::Lookup { url } => match cache.lookup(&url).await? {
            Some(record) => print_json(&record)?,
            None => {
                eprintln!("Not cached: {}", url);
                std::process::exit(1);
            }
        },
        Commands::Evict {
            max_age_days,
            format,
        } => {
            let days = max_age_days.unwrap_or(config.cache().max_cache_age_days);
            let report = cache.evict(days).await?;
            match format {
                OutputFormat::Json => print_json(&report)?,
                OutputFormat::Table => print!("{}", render_eviction(&report)),
            }
        }
        Commands::Sweep => {
            let removed = cache.sweep_orphans().await?;
            println!("Removed {} orphaned file(s)", removed);
        }
    }

    Ok(())
}
