//! Configuration module
//!
//! Process-wide settings for the media cache, the ScrapeCreators ad-library
//! client and the binaries. Everything is read from the environment (a `.env`
//! file is honoured) with defaults for every optional value.

use std::env;
use std::path::{Path, PathBuf};

const DB_MAX_CONNECTIONS: u32 = 4;
const DB_TIMEOUT_SECS: u64 = 30;
const MAX_CACHE_AGE_DAYS: u32 = 30;
const MAX_CACHE_SIZE_GB: f64 = 5.0;
const CLEANUP_INTERVAL_SECS: u64 = 3600;
const DEFAULT_SEARCH_LIMIT: u32 = 20;
const DOWNLOAD_TIMEOUT_SECS: u64 = 30;
const MAX_DOWNLOAD_MB: u64 = 200;
const SCRAPECREATORS_API_URL: &str = "https://api.scrapecreators.com";

/// Directory name used under the platform cache directory.
pub const CACHE_DIR_NAME: &str = "facebook-ads-mcp";
/// File name of the metadata index inside the cache root.
pub const INDEX_FILE_NAME: &str = "index.db";
/// Directory holding blob files inside the cache root.
pub const MEDIA_DIR_NAME: &str = "media";

/// Media cache settings
#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub cache_dir: PathBuf,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub max_cache_age_days: u32,
    pub max_cache_size_gb: f64,
    /// Interval in seconds between background cleanup runs. 0 = disabled.
    pub cleanup_interval_secs: u64,
    pub default_search_limit: u32,
}

impl CacheConfig {
    /// Cache settings rooted at `cache_dir` with every other value at its default.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            db_max_connections: DB_MAX_CONNECTIONS,
            db_timeout_seconds: DB_TIMEOUT_SECS,
            max_cache_age_days: MAX_CACHE_AGE_DAYS,
            max_cache_size_gb: MAX_CACHE_SIZE_GB,
            cleanup_interval_secs: CLEANUP_INTERVAL_SECS,
            default_search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let cache_dir = match env::var("ADLIB_CACHE_DIR") {
            Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir.trim()),
            _ => default_cache_dir()?,
        };

        Ok(Self {
            cache_dir,
            db_max_connections: env::var("ADLIB_DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| DB_MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(DB_MAX_CONNECTIONS),
            db_timeout_seconds: env::var("ADLIB_DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| DB_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(DB_TIMEOUT_SECS),
            max_cache_age_days: env::var("ADLIB_MAX_CACHE_AGE_DAYS")
                .unwrap_or_else(|_| MAX_CACHE_AGE_DAYS.to_string())
                .parse()
                .unwrap_or(MAX_CACHE_AGE_DAYS),
            max_cache_size_gb: env::var("ADLIB_MAX_CACHE_SIZE_GB")
                .unwrap_or_else(|_| MAX_CACHE_SIZE_GB.to_string())
                .parse()
                .unwrap_or(MAX_CACHE_SIZE_GB),
            cleanup_interval_secs: env::var("ADLIB_CLEANUP_INTERVAL_SECS")
                .unwrap_or_else(|_| CLEANUP_INTERVAL_SECS.to_string())
                .parse()
                .unwrap_or(CLEANUP_INTERVAL_SECS),
            default_search_limit: env::var("ADLIB_DEFAULT_SEARCH_LIMIT")
                .unwrap_or_else(|_| DEFAULT_SEARCH_LIMIT.to_string())
                .parse()
                .unwrap_or(DEFAULT_SEARCH_LIMIT),
        })
    }

    pub fn index_path(&self) -> PathBuf {
        self.cache_dir.join(INDEX_FILE_NAME)
    }

    pub fn media_dir(&self) -> PathBuf {
        self.cache_dir.join(MEDIA_DIR_NAME)
    }

    pub fn max_cache_size_bytes(&self) -> i64 {
        (self.max_cache_size_gb * 1024.0 * 1024.0 * 1024.0) as i64
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.cache_dir.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("ADLIB_CACHE_DIR must not be empty"));
        }
        if self.db_max_connections == 0 {
            return Err(anyhow::anyhow!(
                "ADLIB_DB_MAX_CONNECTIONS must be at least 1"
            ));
        }
        if !self.max_cache_size_gb.is_finite() || self.max_cache_size_gb <= 0.0 {
            return Err(anyhow::anyhow!(
                "ADLIB_MAX_CACHE_SIZE_GB must be a positive number"
            ));
        }
        if self.default_search_limit == 0 {
            return Err(anyhow::anyhow!(
                "ADLIB_DEFAULT_SEARCH_LIMIT must be at least 1"
            ));
        }
        Ok(())
    }
}

/// ScrapeCreators ad-library API and media download settings
#[derive(Clone, Debug)]
pub struct ScrapeCreatorsConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub download_timeout_secs: u64,
    pub max_download_bytes: u64,
}

impl Default for ScrapeCreatorsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: SCRAPECREATORS_API_URL.to_string(),
            download_timeout_secs: DOWNLOAD_TIMEOUT_SECS,
            max_download_bytes: MAX_DOWNLOAD_MB * 1024 * 1024,
        }
    }
}

impl ScrapeCreatorsConfig {
    pub fn from_env() -> Self {
        let max_download_mb = env::var("ADLIB_MAX_DOWNLOAD_MB")
            .unwrap_or_else(|_| MAX_DOWNLOAD_MB.to_string())
            .parse::<u64>()
            .unwrap_or(MAX_DOWNLOAD_MB);

        Self {
            api_key: env::var("SCRAPECREATORS_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            base_url: env::var("SCRAPECREATORS_API_URL")
                .unwrap_or_else(|_| SCRAPECREATORS_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            download_timeout_secs: env::var("ADLIB_DOWNLOAD_TIMEOUT_SECS")
                .unwrap_or_else(|_| DOWNLOAD_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(DOWNLOAD_TIMEOUT_SECS),
            max_download_bytes: max_download_mb * 1024 * 1024,
        }
    }

    /// Returns the API key or an error naming the variable to set.
    pub fn require_api_key(&self) -> Result<&str, anyhow::Error> {
        self.api_key.as_deref().ok_or_else(|| {
            anyhow::anyhow!("SCRAPECREATORS_API_KEY must be set to query the ad library")
        })
    }
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub cache: CacheConfig,
    pub scrapecreators: ScrapeCreatorsConfig,
    pub environment: String,
    pub log_format: String,
}

/// Application configuration shared by the binaries.
#[derive(Clone, Debug)]
pub struct Config(pub Box<AppConfig>);

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        Ok(Config(Box::new(AppConfig {
            cache: CacheConfig::from_env()?,
            scrapecreators: ScrapeCreatorsConfig::from_env(),
            environment,
            log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string()),
        })))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.0.cache.validate()?;
        if self.0.scrapecreators.download_timeout_secs == 0 {
            return Err(anyhow::anyhow!(
                "ADLIB_DOWNLOAD_TIMEOUT_SECS must be at least 1"
            ));
        }
        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.0.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn cache(&self) -> &CacheConfig {
        &self.0.cache
    }

    pub fn cache_mut(&mut self) -> &mut CacheConfig {
        &mut self.0.cache
    }

    pub fn scrapecreators(&self) -> &ScrapeCreatorsConfig {
        &self.0.scrapecreators
    }

    pub fn scrapecreators_mut(&mut self) -> &mut ScrapeCreatorsConfig {
        &mut self.0.scrapecreators
    }

    pub fn json_logs(&self) -> bool {
        self.0.log_format.eq_ignore_ascii_case("json")
    }
}

fn default_cache_dir() -> Result<PathBuf, anyhow::Error> {
    dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".cache")))
        .map(|base| base.join(CACHE_DIR_NAME))
        .ok_or_else(|| {
            anyhow::anyhow!("Could not determine a cache directory; set ADLIB_CACHE_DIR")
        })
}

/// True when `path` lives under `root` after lexical normalization.
pub fn is_within(root: &Path, path: &Path) -> bool {
    path.starts_with(root)
        && !path
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
}
