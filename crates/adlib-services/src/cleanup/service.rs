use std::sync::Arc;
use std::time::Duration;

use adlib_core::models::EvictionReport;
use adlib_core::{AppError, CacheConfig};
use serde::Serialize;
use tokio::time::interval;

use crate::services::MediaCacheService;

/// Result of one cleanup pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupSummary {
    pub expired: EvictionReport,
    pub size_limit: EvictionReport,
    pub orphans_removed: usize,
}

/// Periodic cache maintenance: age eviction, size cap and orphan sweep.
#[derive(Clone)]
pub struct CleanupService {
    cache: Arc<MediaCacheService>,
    max_age_days: u32,
    max_cache_bytes: i64,
    interval: Duration,
}

impl CleanupService {
    pub fn new(cache: Arc<MediaCacheService>, config: &CacheConfig) -> Self {
        Self {
            cache,
            max_age_days: config.max_cache_age_days,
            max_cache_bytes: config.max_cache_size_bytes(),
            interval: Duration::from_secs(config.cleanup_interval_secs),
        }
    }

    /// False when the configured interval is 0.
    pub fn is_enabled(&self) -> bool {
        !self.interval.is_zero()
    }

    /// Start the background cleanup task. The first pass runs immediately.
    /// Returns `None` when cleanup is disabled, else a JoinHandle for shutdown.
    pub fn start(self: Arc<Self>) -> Option<tokio::task::JoinHandle<()>> {
        if !self.is_enabled() {
            tracing::info!("Background cache cleanup disabled");
            return None;
        }

        Some(tokio::spawn(async move {
            let mut cleanup_interval = interval(self.interval);

            loop {
                cleanup_interval.tick().await;

                tracing::info!("Starting scheduled cache cleanup");

                if let Err(e) = self.run_once().await {
                    tracing::error!(error = %e, "Cache cleanup failed");
                }
            }
        }))
    }

    /// Run all cleanup steps once. A failing step is logged and the rest still run.
    #[tracing::instrument(skip(self), fields(cleanup.operation = "cache"))]
    pub async fn run_once(&self) -> Result<CleanupSummary, AppError> {
        let expired = match self.cache.evict(self.max_age_days).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(error = %e, "Failed to evict expired media");
                EvictionReport::default()
            }
        };

        let size_limit = match self.cache.enforce_size_limit(self.max_cache_bytes).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(error = %e, "Failed to enforce cache size limit");
                EvictionReport::default()
            }
        };

        let orphans_removed = match self.cache.sweep_orphans().await {
            Ok(count) => count,
            Err(e) => {
                tracing::error!(error = %e, "Failed to sweep orphaned blobs");
                0
            }
        };

        tracing::info!(
            expired = expired.removed_count,
            size_limited = size_limit.removed_count,
            orphans_removed,
            bytes_freed = expired.bytes_freed + size_limit.bytes_freed,
            "Cache cleanup completed"
        );

        Ok(CleanupSummary {
            expired,
            size_limit,
            orphans_removed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adlib_core::models::{MediaKind, NewCachedMedia};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_run_once_trims_to_size_and_sweeps() {
        let dir = tempdir().unwrap();
        let mut config = CacheConfig::new(dir.path());
        // 100 bytes
        config.max_cache_size_gb = 100.0 / (1024.0 * 1024.0 * 1024.0);
        let cache = Arc::new(MediaCacheService::open(config.clone()).await.unwrap());

        for i in 0..3 {
            let media = NewCachedMedia::new(
                format!("https://cdn.example.com/{}.jpg", i),
                "image/jpeg",
                MediaKind::Image,
            );
            cache.store(media, &[0u8; 60]).await.unwrap();
        }
        std::fs::write(dir.path().join("media").join("orphan.jpg"), b"x").unwrap();

        let service = CleanupService::new(cache.clone(), &config);
        let summary = service.run_once().await.unwrap();

        assert_eq!(summary.expired.removed_count, 0);
        assert_eq!(summary.size_limit.removed_count, 2);
        assert_eq!(summary.orphans_removed, 1);

        let stats = cache.statistics().await.unwrap();
        assert_eq!(stats.count, 1);
        assert!(stats.total_bytes <= 100);
    }

    #[tokio::test]
    async fn test_disabled_service_does_not_start() {
        let dir = tempdir().unwrap();
        let mut config = CacheConfig::new(dir.path());
        config.cleanup_interval_secs = 0;
        let cache = Arc::new(MediaCacheService::open(config.clone()).await.unwrap());

        let service = Arc::new(CleanupService::new(cache, &config));
        assert!(!service.is_enabled());
        assert!(service.start().is_none());
    }
}
