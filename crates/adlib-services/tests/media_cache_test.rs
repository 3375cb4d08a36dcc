use std::path::PathBuf;
use std::sync::Arc;

use adlib_core::models::{MediaKind, NewCachedMedia, SearchFilters};
use adlib_core::{AppError, CacheConfig};
use adlib_db::{create_pool, CachedMediaRepository};
use adlib_services::{derive_cache_key, BlobStore, LocalBlobStore, MediaCacheService, StorageError};
use adlib_storage::{blob_path_for, StagedBlob, StorageResult};
use async_trait::async_trait;
use serde_json::json;
use tempfile::{tempdir, TempDir};

async fn open_cache() -> (TempDir, MediaCacheService) {
    let dir = tempdir().unwrap();
    let cache = MediaCacheService::open(CacheConfig::new(dir.path()))
        .await
        .unwrap();
    (dir, cache)
}

fn image(url: &str, content_type: &str) -> NewCachedMedia {
    NewCachedMedia::new(url, content_type, MediaKind::Image)
}

#[tokio::test]
async fn test_store_then_lookup_returns_record() {
    let (_dir, cache) = open_cache().await;
    let url = "https://scontent.example.net/ad-1.png?oh=1";
    let bytes = vec![7u8; 1234];

    let stored = cache.store(image(url, "image/png"), &bytes).await.unwrap();
    assert_eq!(stored.key, derive_cache_key(url));

    let found = cache.lookup(url).await.unwrap().expect("cache hit");
    assert_eq!(found.file_size_bytes, bytes.len() as i64);
    assert_eq!(found.content_type, "image/png");
    assert_eq!(found.media_kind, MediaKind::Image);
    assert_eq!(found.source_url, url);
    assert!(found.last_accessed_at >= stored.last_accessed_at);
    assert_eq!(cache.read_blob(&found).await.unwrap(), bytes);
}

#[tokio::test]
async fn test_lookup_miss_for_unknown_url() {
    let (_dir, cache) = open_cache().await;
    assert!(cache
        .lookup("https://cdn.example.com/never.jpg")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_missing_blob_self_heals() {
    let (_dir, cache) = open_cache().await;
    let url = "https://cdn.example.com/gone.jpg";
    let record = cache
        .store(image(url, "image/jpeg").with_brand("Nike"), b"jpeg bytes")
        .await
        .unwrap();

    std::fs::remove_file(cache.blob_location(&record).unwrap()).unwrap();

    assert!(cache.lookup(url).await.unwrap().is_none());
    assert!(cache
        .search(&SearchFilters::brand("Nike"))
        .await
        .unwrap()
        .is_empty());
    assert_eq!(cache.statistics().await.unwrap().count, 0);
}

#[tokio::test]
async fn test_search_skips_and_purges_stale_rows() {
    let (_dir, cache) = open_cache().await;
    let kept = cache
        .store(image("https://cdn.example.com/1.jpg", "image/jpeg").with_brand("Nike"), b"one")
        .await
        .unwrap();
    let gone = cache
        .store(image("https://cdn.example.com/2.jpg", "image/jpeg").with_brand("Nike"), b"two")
        .await
        .unwrap();
    std::fs::remove_file(cache.blob_location(&gone).unwrap()).unwrap();

    let results = cache
        .search(&SearchFilters::brand("Nike").with_limit(1))
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].key, kept.key);
    assert_eq!(cache.statistics().await.unwrap().count, 1);
}

#[tokio::test]
async fn test_read_blob_of_missing_file_is_not_found() {
    let (_dir, cache) = open_cache().await;
    let url = "https://cdn.example.com/vanish.jpg";
    let record = cache.store(image(url, "image/jpeg"), b"x").await.unwrap();
    std::fs::remove_file(cache.blob_location(&record).unwrap()).unwrap();

    let result = cache.read_blob(&record).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert!(cache.repository().get(&record.key).await.unwrap().is_none());
}

#[tokio::test]
async fn test_storing_twice_keeps_one_record_with_latest_content() {
    let (_dir, cache) = open_cache().await;
    let url = "https://cdn.example.com/creative.jpg";

    cache
        .store(image(url, "image/jpeg"), b"first version")
        .await
        .unwrap();
    cache
        .record_analysis(url, json!({"summary": "old"}))
        .await
        .unwrap();
    cache
        .store(image(url, "image/jpeg"), b"second, longer version")
        .await
        .unwrap();

    let stats = cache.statistics().await.unwrap();
    assert_eq!(stats.count, 1);

    let found = cache.lookup(url).await.unwrap().unwrap();
    assert_eq!(found.file_size_bytes, "second, longer version".len() as i64);
    assert!(found.analysis_results.is_none());
    assert_eq!(
        cache.read_blob(&found).await.unwrap(),
        b"second, longer version".to_vec()
    );
}

#[tokio::test]
async fn test_restore_with_new_content_type_removes_old_blob() {
    let (dir, cache) = open_cache().await;
    let url = "https://cdn.example.com/creative";

    let first = cache.store(image(url, "image/jpeg"), b"jpeg").await.unwrap();
    let second = cache.store(image(url, "image/png"), b"png").await.unwrap();

    assert_ne!(first.blob_path, second.blob_path);
    assert!(!dir.path().join(&first.blob_path).exists());
    assert!(dir.path().join(&second.blob_path).exists());
}

#[tokio::test]
async fn test_store_rejects_empty_url() {
    let (_dir, cache) = open_cache().await;
    let result = cache.store(image("   ", "image/jpeg"), b"x").await;
    assert!(matches!(result, Err(AppError::InvalidInput(_))));
}

#[tokio::test]
async fn test_record_analysis_requires_cached_media() {
    let (_dir, cache) = open_cache().await;
    let result = cache
        .record_analysis("https://cdn.example.com/unknown.jpg", json!({"summary": "x"}))
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_record_analysis_rejects_non_object_payload() {
    let (_dir, cache) = open_cache().await;
    let url = "https://cdn.example.com/a.jpg";
    cache.store(image(url, "image/jpeg"), b"x").await.unwrap();

    let result = cache.record_analysis(url, json!(["not", "an", "object"])).await;
    assert!(matches!(result, Err(AppError::MalformedAnalysis(_))));
}

#[tokio::test]
async fn test_record_analysis_is_returned_by_lookup() {
    let (_dir, cache) = open_cache().await;
    let url = "https://cdn.example.com/analyzed.jpg";
    cache.store(image(url, "image/jpeg"), b"x").await.unwrap();

    let analysis = json!({
        "colors": {"dominant_colors": ["red", "white"]},
        "people_description": "athlete mid-stride",
        "text_elements": {"headline": ["Just Do It"], "cta": "Shop"}
    });
    let updated = cache.record_analysis(url, analysis.clone()).await.unwrap();
    assert!(updated.analysis_cached_at.is_some());
    assert_eq!(updated.has_people, Some(true));
    assert_eq!(updated.dominant_colors.as_deref(), Some("red,white"));

    let found = cache.lookup(url).await.unwrap().unwrap();
    assert_eq!(found.analysis_results, Some(analysis));
    assert!(found.analysis_cached_at.is_some());
}

#[tokio::test]
async fn test_search_by_people_and_color() {
    let (_dir, cache) = open_cache().await;
    let with_people = "https://cdn.example.com/people.jpg";
    let product_only = "https://cdn.example.com/product.jpg";
    let unanalyzed = "https://cdn.example.com/raw.jpg";
    for url in [with_people, product_only, unanalyzed] {
        cache.store(image(url, "image/jpeg"), b"x").await.unwrap();
    }

    cache
        .record_analysis(
            with_people,
            json!({"colors": {"dominant_colors": ["dark red"]}, "people_description": "two friends"}),
        )
        .await
        .unwrap();
    cache
        .record_analysis(
            product_only,
            json!({"colors": {"dominant_colors": ["blue"]}}),
        )
        .await
        .unwrap();

    let people = cache
        .search(&SearchFilters {
            has_people: Some(true),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(people.len(), 1);
    assert_eq!(people[0].source_url, with_people);
    assert!(people.iter().all(|r| r.has_people == Some(true)));

    let red = cache
        .search(&SearchFilters {
            color_contains: Some("red".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(red.len(), 1);
    assert!(red
        .iter()
        .all(|r| r.dominant_colors.as_deref().unwrap_or_default().contains("red")));
}

#[tokio::test]
async fn test_evict_zero_days_clears_cache() {
    let (dir, cache) = open_cache().await;
    let a = cache
        .store(image("https://cdn.example.com/a.jpg", "image/jpeg"), &[1u8; 2000])
        .await
        .unwrap();
    cache
        .store(image("https://cdn.example.com/b.jpg", "image/jpeg"), &[2u8; 3000])
        .await
        .unwrap();

    let report = cache.evict(0).await.unwrap();
    assert_eq!(report.removed_count, 2);
    assert_eq!(report.bytes_freed, 5000);
    assert_eq!(report.remaining_count, 0);
    assert_eq!(report.max_age_days, Some(0));
    assert_eq!(cache.statistics().await.unwrap().count, 0);
    assert!(!dir.path().join(&a.blob_path).exists());
}

#[tokio::test]
async fn test_evict_keeps_recent_media() {
    let (_dir, cache) = open_cache().await;
    cache
        .store(image("https://cdn.example.com/a.jpg", "image/jpeg"), b"x")
        .await
        .unwrap();

    let report = cache.evict(30).await.unwrap();
    assert_eq!(report.removed_count, 0);
    assert_eq!(report.remaining_count, 1);
}

#[tokio::test]
async fn test_evict_on_empty_cache_is_noop() {
    let (_dir, cache) = open_cache().await;
    let report = cache.evict(0).await.unwrap();
    assert_eq!(report.removed_count, 0);
    assert_eq!(report.bytes_freed, 0);
    assert_eq!(report.failed_file_deletes, 0);
}

#[tokio::test]
async fn test_brand_statistics_scenario() {
    let (_dir, cache) = open_cache().await;
    let a = cache
        .store(
            image("https://cdn.example.com/a.jpg", "image/jpeg").with_brand("Nike"),
            &[0u8; 2000],
        )
        .await
        .unwrap();
    let b = cache
        .store(
            image("https://cdn.example.com/b.jpg", "image/jpeg").with_brand("Nike"),
            &[0u8; 3000],
        )
        .await
        .unwrap();
    cache
        .store(
            NewCachedMedia::new("https://cdn.example.com/c.mp4", "video/mp4", MediaKind::Video)
                .with_brand("Adidas")
                .with_ad_id("987654")
                .with_duration(15.0),
            &vec![0u8; 500_000],
        )
        .await
        .unwrap();

    let stats = cache.statistics().await.unwrap();
    assert_eq!(stats.count, 3);
    assert_eq!(stats.distinct_brand_count, 2);
    assert_eq!(stats.total_bytes, 505_000);
    assert_eq!(stats.kind(MediaKind::Video).count, 1);

    let nike = cache.search(&SearchFilters::brand("Nike")).await.unwrap();
    let mut keys: Vec<_> = nike.into_iter().map(|r| r.key).collect();
    keys.sort();
    let mut expected = vec![a.key, b.key];
    expected.sort();
    assert_eq!(keys, expected);
}

#[tokio::test]
async fn test_sweep_orphans_removes_unreferenced_files() {
    let (dir, cache) = open_cache().await;
    let kept = cache
        .store(image("https://cdn.example.com/a.jpg", "image/jpeg"), b"x")
        .await
        .unwrap();
    let orphan = dir.path().join("media").join("leftover.png");
    std::fs::write(&orphan, b"orphan").unwrap();

    assert_eq!(cache.sweep_orphans().await.unwrap(), 1);
    assert!(!orphan.exists());
    assert!(dir.path().join(&kept.blob_path).exists());
    assert_eq!(cache.sweep_orphans().await.unwrap(), 0);
}

#[tokio::test]
async fn test_cache_survives_reopen() {
    let dir = tempdir().unwrap();
    let url = "https://cdn.example.com/persist.jpg";
    {
        let cache = MediaCacheService::open(CacheConfig::new(dir.path()))
            .await
            .unwrap();
        cache.store(image(url, "image/jpeg"), b"persisted").await.unwrap();
    }

    let cache = MediaCacheService::open(CacheConfig::new(dir.path()))
        .await
        .unwrap();
    let found = cache.lookup(url).await.unwrap().unwrap();
    assert_eq!(cache.read_blob(&found).await.unwrap(), b"persisted".to_vec());
}

#[tokio::test]
async fn test_evict_with_huge_age_keeps_everything() {
    let (_dir, cache) = open_cache().await;
    cache
        .store(image("https://cdn.example.com/a.jpg", "image/jpeg"), b"x")
        .await
        .unwrap();

    let report = cache.evict(u32::MAX).await.unwrap();
    assert_eq!(report.removed_count, 0);
    assert_eq!(report.remaining_count, 1);
    assert_eq!(report.max_age_days, Some(u32::MAX));

    let report = cache.evict(100_000_000).await.unwrap();
    assert_eq!(report.removed_count, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_lookups_never_drop_a_store() {
    let (_dir, cache) = open_cache().await;

    let mut tasks = Vec::new();
    for i in 0..100 {
        let url = format!("https://cdn.example.com/race-{}.jpg", i);

        let reader = cache.clone();
        let reader_url = url.clone();
        let lookups = tokio::spawn(async move {
            for _ in 0..30 {
                reader.lookup(&reader_url).await.unwrap();
                tokio::task::yield_now().await;
            }
        });

        let writer = cache.clone();
        let store = tokio::spawn(async move {
            writer
                .store(image(&url, "image/jpeg"), &[9u8; 4096])
                .await
                .map(|record| (url, record))
        });

        tasks.push((lookups, store));
    }

    for (lookups, store) in tasks {
        lookups.await.unwrap();
        let (url, stored) = store.await.unwrap().unwrap();
        let found = cache.lookup(&url).await.unwrap().expect("stored media stays cached");
        assert_eq!(found.blob_path, stored.blob_path);
        assert_eq!(cache.read_blob(&found).await.unwrap().len(), 4096);
    }
    assert_eq!(cache.statistics().await.unwrap().count, 100);
}

#[tokio::test]
async fn test_sweep_after_concurrent_stores_keeps_committed_blobs() {
    let (dir, cache) = open_cache().await;

    let mut stores = Vec::new();
    for i in 0..20 {
        let writer = cache.clone();
        stores.push(tokio::spawn(async move {
            let url = format!("https://cdn.example.com/sweep-{}.jpg", i);
            writer.store(image(&url, "image/jpeg"), b"bytes").await
        }));
    }
    let sweeper = cache.clone();
    let sweep = tokio::spawn(async move { sweeper.sweep_orphans().await });

    let mut records = Vec::new();
    for store in stores {
        records.push(store.await.unwrap().unwrap());
    }
    assert_eq!(sweep.await.unwrap().unwrap(), 0);
    for record in records {
        assert!(dir.path().join(&record.blob_path).exists());
    }
}

/// Local store whose `delete` fails for one blob path.
struct FailingDeleteStore {
    inner: LocalBlobStore,
    failing_path: String,
}

#[async_trait]
impl BlobStore for FailingDeleteStore {
    async fn stage(&self, key: &str, data: &[u8], content_type: &str) -> StorageResult<StagedBlob> {
        self.inner.stage(key, data, content_type).await
    }

    async fn promote(&self, staged: &StagedBlob) -> StorageResult<()> {
        self.inner.promote(staged).await
    }

    async fn discard(&self, staged: &StagedBlob) -> StorageResult<()> {
        self.inner.discard(staged).await
    }

    async fn read(&self, blob_path: &str) -> StorageResult<Vec<u8>> {
        self.inner.read(blob_path).await
    }

    async fn delete(&self, blob_path: &str) -> StorageResult<()> {
        if blob_path == self.failing_path {
            return Err(StorageError::DeleteFailed(format!("{}: permission denied", blob_path)));
        }
        self.inner.delete(blob_path).await
    }

    async fn exists(&self, blob_path: &str) -> StorageResult<bool> {
        self.inner.exists(blob_path).await
    }

    async fn size(&self, blob_path: &str) -> StorageResult<u64> {
        self.inner.size(blob_path).await
    }

    async fn list(&self) -> StorageResult<Vec<String>> {
        self.inner.list().await
    }

    fn resolve(&self, blob_path: &str) -> StorageResult<PathBuf> {
        self.inner.resolve(blob_path)
    }
}

#[tokio::test]
async fn test_evict_continues_past_failed_file_delete() {
    let dir = tempdir().unwrap();
    let config = CacheConfig::new(dir.path());
    let stuck_url = "https://cdn.example.com/stuck.jpg";
    let store = FailingDeleteStore {
        inner: LocalBlobStore::new(dir.path()).await.unwrap(),
        failing_path: blob_path_for(&derive_cache_key(stuck_url), "image/jpeg"),
    };
    let pool = create_pool(&config).await.unwrap();
    let cache = MediaCacheService::new(CachedMediaRepository::new(pool), Arc::new(store), config);

    let mut others = Vec::new();
    for url in ["https://cdn.example.com/a.jpg", "https://cdn.example.com/b.jpg"] {
        others.push(cache.store(image(url, "image/jpeg"), b"x").await.unwrap());
    }
    let stuck = cache.store(image(stuck_url, "image/jpeg"), b"x").await.unwrap();

    let report = cache.evict(0).await.unwrap();
    assert_eq!(report.removed_count, 3);
    assert_eq!(report.failed_file_deletes, 1);
    assert_eq!(cache.statistics().await.unwrap().count, 0);

    for record in others {
        assert!(!dir.path().join(&record.blob_path).exists());
    }
    assert!(dir.path().join(&stuck.blob_path).exists());
}
