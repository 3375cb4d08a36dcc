//! Media cache facade
//!
//! Single entry point for the cache: derives keys, checks the index before any
//! download, writes blobs before index rows, and purges rows whose blob has
//! disappeared.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use adlib_core::models::{
    validate_analysis_payload, CacheStats, CachedMedia, EvictionReport, NewCachedMedia,
    QuickFilters, SearchFilters,
};
use adlib_core::{AppError, CacheConfig};
use adlib_db::{create_pool, CachedMediaRepository};
use adlib_storage::{derive_cache_key, BlobStore, LocalBlobStore, StorageError};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value as JsonValue;

/// Cache keys with a store in progress, counted per key.
#[derive(Clone, Default)]
struct InFlightStores {
    keys: Arc<Mutex<HashMap<String, usize>>>,
}

impl InFlightStores {
    fn enter(&self, key: &str) -> InFlightGuard {
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        *keys.entry(key.to_string()).or_insert(0) += 1;
        InFlightGuard {
            keys: self.keys.clone(),
            key: key.to_string(),
        }
    }

    fn snapshot(&self) -> HashSet<String> {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

struct InFlightGuard {
    keys: Arc<Mutex<HashMap<String, usize>>>,
    key: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(count) = keys.get_mut(&self.key) {
            *count -= 1;
            if *count == 0 {
                keys.remove(&self.key);
            }
        }
    }
}

/// Cache key encoded in a blob path (`media/{key}.{ext}`).
fn key_of_blob_path(blob_path: &str) -> Option<&str> {
    Path::new(blob_path).file_stem().and_then(|stem| stem.to_str())
}

/// Cutoff for `max_age_days`; ages reaching past the representable range
/// select everything.
fn eviction_cutoff(now: DateTime<Utc>, max_age_days: u32) -> DateTime<Utc> {
    now.checked_sub_signed(Duration::days(i64::from(max_age_days)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[derive(Clone)]
pub struct MediaCacheService {
    repository: CachedMediaRepository,
    store: Arc<dyn BlobStore>,
    config: CacheConfig,
    in_flight: InFlightStores,
}

impl MediaCacheService {
    pub fn new(
        repository: CachedMediaRepository,
        store: Arc<dyn BlobStore>,
        config: CacheConfig,
    ) -> Self {
        Self {
            repository,
            store,
            config,
            in_flight: InFlightStores::default(),
        }
    }

    /// Open the cache rooted at `config.cache_dir`, creating the directory
    /// layout and index on first use.
    pub async fn open(config: CacheConfig) -> Result<Self, AppError> {
        config.validate()?;
        let store = LocalBlobStore::new(&config.cache_dir).await?;
        let pool = create_pool(&config).await?;

        tracing::info!(cache_dir = %config.cache_dir.display(), "Media cache ready");

        Ok(Self::new(
            CachedMediaRepository::new(pool),
            Arc::new(store),
            config,
        ))
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn repository(&self) -> &CachedMediaRepository {
        &self.repository
    }

    /// Absolute filesystem location of a record's blob
    pub fn blob_location(&self, record: &CachedMedia) -> Result<PathBuf, AppError> {
        Ok(self.store.resolve(&record.blob_path)?)
    }

    /// Look up a URL. A row whose blob is gone is purged and reported as a miss.
    #[tracing::instrument(skip(self), fields(cache.operation = "lookup"))]
    pub async fn lookup(&self, url: &str) -> Result<Option<CachedMedia>, AppError> {
        let key = derive_cache_key(url);

        let Some(mut record) = self.repository.get(&key).await? else {
            tracing::debug!(cache_key = %key, "Cache miss");
            return Ok(None);
        };

        if !self.blob_present(&record).await? {
            self.purge_stale(&record).await?;
            return Ok(None);
        }

        let now = Utc::now();
        self.repository.touch_access(&key, now).await?;
        record.last_accessed_at = now;

        tracing::debug!(cache_key = %key, "Cache hit");
        Ok(Some(record))
    }

    /// Store downloaded bytes for `media.source_url`, replacing any previous record.
    ///
    /// The blob is staged, moved into place, and only then is the index row
    /// committed, so a visible row always has its blob on disk.
    #[tracing::instrument(skip(self, media, data), fields(cache.operation = "store", size_bytes = data.len()))]
    pub async fn store(&self, media: NewCachedMedia, data: &[u8]) -> Result<CachedMedia, AppError> {
        let url = media.source_url.trim();
        if url.is_empty() {
            return Err(AppError::InvalidInput("Source URL must not be empty".to_string()));
        }

        let key = derive_cache_key(url);
        let _in_flight = self.in_flight.enter(&key);

        let staged = self.store.stage(&key, data, &media.content_type).await?;
        if let Err(e) = self.store.promote(&staged).await {
            tracing::error!(error = %e, cache_key = %key, "Failed to move blob into place");
            if let Err(discard_err) = self.store.discard(&staged).await {
                tracing::warn!(error = %discard_err, "Failed to discard staged blob");
            }
            return Err(e.into());
        }

        let now = Utc::now();
        let record = CachedMedia {
            key: key.clone(),
            source_url: url.to_string(),
            blob_path: staged.blob_path.clone(),
            content_type: media.content_type,
            file_size_bytes: data.len() as i64,
            media_kind: media.media_kind,
            downloaded_at: now,
            last_accessed_at: now,
            duration_seconds: media.duration_seconds,
            brand_name: media.brand_name.filter(|b| !b.trim().is_empty()),
            ad_id: media.ad_id.filter(|a| !a.trim().is_empty()),
            analysis_results: None,
            analysis_cached_at: None,
            dominant_colors: None,
            has_people: None,
            text_elements: None,
        };

        let previous = match self.repository.upsert(&record).await {
            Ok(previous) => previous,
            Err(e) => {
                self.remove_unreferenced_blob(&key, &record.blob_path).await;
                return Err(e);
            }
        };

        if let Some(previous) = previous.filter(|p| *p != record.blob_path) {
            if let Err(e) = self.store.delete(&previous).await {
                tracing::warn!(error = %e, blob_path = %previous, "Failed to delete replaced blob");
            }
        }

        tracing::info!(
            cache_key = %key,
            blob_path = %record.blob_path,
            media_kind = %record.media_kind,
            size_bytes = record.file_size_bytes,
            "Media cached"
        );

        Ok(record)
    }

    /// Read a record's bytes. A missing blob purges the row and reports `NotFound`.
    #[tracing::instrument(skip(self, record), fields(cache.operation = "read", cache_key = %record.key))]
    pub async fn read_blob(&self, record: &CachedMedia) -> Result<Vec<u8>, AppError> {
        match self.store.read(&record.blob_path).await {
            Ok(data) => Ok(data),
            Err(StorageError::NotFound(_)) => {
                self.purge_stale(record).await?;
                Err(AppError::NotFound(format!(
                    "Cached media for {} is no longer on disk",
                    record.source_url
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Attach an analysis payload to an already cached URL and refresh its
    /// quick-filter fields.
    #[tracing::instrument(skip(self, analysis), fields(cache.operation = "record_analysis"))]
    pub async fn record_analysis(
        &self,
        url: &str,
        analysis: JsonValue,
    ) -> Result<CachedMedia, AppError> {
        validate_analysis_payload(&analysis)?;

        let key = derive_cache_key(url);
        let filters = QuickFilters::extract(&analysis);

        match self
            .repository
            .update_analysis(&key, &analysis, &filters, Utc::now())
            .await
        {
            Ok(()) => {}
            Err(AppError::NotFound(_)) => {
                return Err(AppError::NotFound(format!(
                    "No cached media for {}; cache it before saving analysis",
                    url.trim()
                )));
            }
            Err(e) => return Err(e),
        }

        tracing::info!(
            cache_key = %key,
            dominant_colors = ?filters.dominant_colors,
            has_people = ?filters.has_people,
            "Analysis recorded"
        );

        self.repository
            .get(&key)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No cached media for {}", url.trim())))
    }

    /// Structured search. Rows whose blob has disappeared are purged and
    /// left out of the results.
    #[tracing::instrument(skip(self), fields(cache.operation = "search"))]
    pub async fn search(&self, filters: &SearchFilters) -> Result<Vec<CachedMedia>, AppError> {
        loop {
            let rows = self.repository.query(filters).await?;
            let mut live = Vec::with_capacity(rows.len());
            let mut purged = 0usize;

            for record in rows {
                if self.blob_present(&record).await? {
                    live.push(record);
                } else {
                    self.purge_stale(&record).await?;
                    purged += 1;
                }
            }

            // A purge can free room under the limit; query again to refill.
            if purged == 0 || filters.limit.is_none() {
                return Ok(live);
            }
        }
    }

    pub async fn statistics(&self) -> Result<CacheStats, AppError> {
        self.repository.stats().await
    }

    /// Remove every record downloaded `max_age_days` or more ago.
    #[tracing::instrument(skip(self), fields(cache.operation = "evict"))]
    pub async fn evict(&self, max_age_days: u32) -> Result<EvictionReport, AppError> {
        let before = self.repository.stats().await?;
        let cutoff = eviction_cutoff(Utc::now(), max_age_days);

        let paths = self.repository.delete_older_than(cutoff).await?;
        let failed = self.delete_blobs(&paths).await;

        let after = self.repository.stats().await?;
        let report = EvictionReport::from_stats(&before, &after, failed).with_max_age_days(max_age_days);

        tracing::info!(
            max_age_days,
            removed = report.removed_count,
            bytes_freed = report.bytes_freed,
            failed_file_deletes = failed,
            "Cache eviction completed"
        );

        Ok(report)
    }

    /// Remove least recently used records until the cache fits in `max_bytes`.
    #[tracing::instrument(skip(self), fields(cache.operation = "size_limit"))]
    pub async fn enforce_size_limit(&self, max_bytes: i64) -> Result<EvictionReport, AppError> {
        let before = self.repository.stats().await?;
        if before.total_bytes <= max_bytes {
            return Ok(EvictionReport::from_stats(&before, &before, 0));
        }

        let paths = self.repository.delete_least_recently_used(max_bytes).await?;
        let failed = self.delete_blobs(&paths).await;

        let after = self.repository.stats().await?;
        let report = EvictionReport::from_stats(&before, &after, failed);

        tracing::info!(
            max_bytes,
            removed = report.removed_count,
            bytes_freed = report.bytes_freed,
            "Cache size limit enforced"
        );

        Ok(report)
    }

    /// Delete blob files that no index row references. Returns the number removed.
    #[tracing::instrument(skip(self), fields(cache.operation = "sweep_orphans"))]
    pub async fn sweep_orphans(&self) -> Result<usize, AppError> {
        // Files, then in-flight stores, then rows. A listed blob whose row is
        // not yet committed belongs to a store that is still in flight.
        let files = self.store.list().await?;
        let in_flight = self.in_flight.snapshot();
        let referenced: HashSet<String> = self.repository.blob_paths().await?.into_iter().collect();

        let orphans: Vec<String> = files
            .into_iter()
            .filter(|path| !referenced.contains(path))
            .filter(|path| key_of_blob_path(path).map_or(true, |key| !in_flight.contains(key)))
            .collect();

        let failed = self.delete_blobs(&orphans).await;
        let removed = orphans.len() - failed;

        if removed > 0 {
            tracing::info!(removed, "Orphaned blobs removed");
        }

        Ok(removed)
    }

    async fn blob_present(&self, record: &CachedMedia) -> Result<bool, AppError> {
        match self.store.exists(&record.blob_path).await {
            Ok(present) => Ok(present),
            // A path that cannot be resolved inside the cache is as good as missing.
            Err(StorageError::InvalidPath(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn purge_stale(&self, record: &CachedMedia) -> Result<(), AppError> {
        let purged = self
            .repository
            .delete_stale(&record.key, &record.blob_path)
            .await?;
        if purged {
            tracing::warn!(
                cache_key = %record.key,
                blob_path = %record.blob_path,
                "Blob missing for cached media; index row purged"
            );
        }
        Ok(())
    }

    /// Delete a promoted blob after its row failed to commit, unless a row
    /// still points at the same path. Leftovers are picked up by the orphan sweep.
    async fn remove_unreferenced_blob(&self, key: &str, blob_path: &str) {
        match self.repository.get(key).await {
            Ok(Some(existing)) if existing.blob_path == blob_path => {}
            Ok(_) => {
                if let Err(e) = self.store.delete(blob_path).await {
                    tracing::warn!(error = %e, blob_path = %blob_path, "Failed to remove uncommitted blob");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, cache_key = %key, "Could not check index; leaving blob for the orphan sweep");
            }
        }
    }

    /// Best-effort delete; returns the number of failures.
    async fn delete_blobs(&self, paths: &[String]) -> usize {
        let mut failed = 0;
        for path in paths {
            if let Err(e) = self.store.delete(path).await {
                failed += 1;
                tracing::error!(
                    error = %e,
                    blob_path = %path,
                    "Failed to delete blob file, continuing"
                );
            }
        }
        failed
    }
}
