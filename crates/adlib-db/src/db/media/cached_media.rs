use std::collections::BTreeMap;

use adlib_core::models::{
    CacheStats, CachedMedia, MediaKind, MediaKindStats, QuickFilters, SearchFilters,
};
use adlib_core::AppError;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use super::row::CachedMediaRow;
use crate::db::transaction::TransactionGuard;

/// Escape `%`, `_` and the escape character itself for a LIKE pattern using `ESCAPE '\'`.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Repository for the cache metadata index
///
/// One row per cache key. Rows carry provenance, blob location, the opaque
/// analysis payload and the quick-filter fields derived from it.
#[derive(Clone)]
pub struct CachedMediaRepository {
    pool: SqlitePool,
}

impl CachedMediaRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    #[tracing::instrument(skip(self), fields(db.table = "cached_media", db.operation = "select"))]
    pub async fn get(&self, key: &str) -> Result<Option<CachedMedia>, AppError> {
        let row = sqlx::query_as::<_, CachedMediaRow>(
            "SELECT * FROM cached_media WHERE cache_key = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(CachedMediaRow::into_domain).transpose()
    }

    /// Insert or fully replace the row for `record.key`.
    ///
    /// Returns the blob path of the row that was replaced, if any.
    #[tracing::instrument(skip(self, record), fields(db.table = "cached_media", db.operation = "upsert", cache_key = %record.key))]
    pub async fn upsert(&self, record: &CachedMedia) -> Result<Option<String>, AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;
        let previous = Self::upsert_in(&mut **tx, record).await?;
        tx.commit().await?;
        Ok(previous)
    }

    /// Same as [`upsert`](Self::upsert) on a caller-owned connection or transaction.
    pub async fn upsert_in(
        conn: &mut SqliteConnection,
        record: &CachedMedia,
    ) -> Result<Option<String>, AppError> {
        // A write as the first statement takes the write lock up front, so a
        // concurrent writer makes this wait on busy_timeout instead of failing
        // a read-to-write upgrade.
        let previous = sqlx::query_scalar::<_, String>(
            "UPDATE cached_media SET blob_path = blob_path WHERE cache_key = ? RETURNING blob_path",
        )
        .bind(&record.key)
        .fetch_optional(&mut *conn)
        .await?;

        let analysis = record
            .analysis_results
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        // analysis_results and analysis_cached_at are null together or set together.
        let analysis_cached_at = analysis.as_ref().map(|_| {
            record
                .analysis_cached_at
                .unwrap_or_else(Utc::now)
                .timestamp_micros()
        });

        sqlx::query(
            r#"
            INSERT INTO cached_media (
                cache_key, source_url, blob_path, content_type, file_size_bytes,
                media_kind, downloaded_at, last_accessed_at, duration_seconds,
                brand_name, ad_id, analysis_results, analysis_cached_at,
                dominant_colors, has_people, text_elements
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(cache_key) DO UPDATE SET
                source_url = excluded.source_url,
                blob_path = excluded.blob_path,
                content_type = excluded.content_type,
                file_size_bytes = excluded.file_size_bytes,
                media_kind = excluded.media_kind,
                downloaded_at = excluded.downloaded_at,
                last_accessed_at = excluded.last_accessed_at,
                duration_seconds = excluded.duration_seconds,
                brand_name = excluded.brand_name,
                ad_id = excluded.ad_id,
                analysis_results = excluded.analysis_results,
                analysis_cached_at = excluded.analysis_cached_at,
                dominant_colors = excluded.dominant_colors,
                has_people = excluded.has_people,
                text_elements = excluded.text_elements
            "#,
        )
        .bind(&record.key)
        .bind(&record.source_url)
        .bind(&record.blob_path)
        .bind(&record.content_type)
        .bind(record.file_size_bytes)
        .bind(record.media_kind.as_str())
        .bind(record.downloaded_at.timestamp_micros())
        .bind(record.last_accessed_at.timestamp_micros())
        .bind(record.duration_seconds)
        .bind(&record.brand_name)
        .bind(&record.ad_id)
        .bind(analysis)
        .bind(analysis_cached_at)
        .bind(&record.dominant_colors)
        .bind(record.has_people)
        .bind(&record.text_elements)
        .execute(&mut *conn)
        .await?;

        Ok(previous)
    }

    /// Replace the analysis payload and quick-filter fields of an existing row.
    ///
    /// Fails with `NotFound` when no row exists for `key`.
    #[tracing::instrument(skip(self, analysis, filters), fields(db.table = "cached_media", db.operation = "update"))]
    pub async fn update_analysis(
        &self,
        key: &str,
        analysis: &JsonValue,
        filters: &QuickFilters,
        analyzed_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let payload = serde_json::to_string(analysis)?;

        let result = sqlx::query(
            r#"
            UPDATE cached_media
            SET analysis_results = ?,
                analysis_cached_at = ?,
                dominant_colors = ?,
                has_people = ?,
                text_elements = ?
            WHERE cache_key = ?
            "#,
        )
        .bind(payload)
        .bind(analyzed_at.timestamp_micros())
        .bind(&filters.dominant_colors)
        .bind(filters.has_people)
        .bind(&filters.text_elements)
        .bind(key)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "No cached media for key {}",
                key
            )));
        }

        Ok(())
    }

    /// Set `last_accessed_at`. Returns false when no row exists.
    #[tracing::instrument(skip(self), fields(db.table = "cached_media", db.operation = "update"))]
    pub async fn touch_access(&self, key: &str, at: DateTime<Utc>) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE cached_media SET last_accessed_at = ? WHERE cache_key = ?")
            .bind(at.timestamp_micros())
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete one row, returning its blob path.
    #[tracing::instrument(skip(self), fields(db.table = "cached_media", db.operation = "delete"))]
    pub async fn delete(&self, key: &str) -> Result<Option<String>, AppError> {
        let blob_path = sqlx::query_scalar::<_, String>(
            "DELETE FROM cached_media WHERE cache_key = ? RETURNING blob_path",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(blob_path)
    }

    /// Delete a row only while it still points at `blob_path`.
    ///
    /// Used to purge stale references without racing a concurrent re-store
    /// that moved the row to a new blob.
    #[tracing::instrument(skip(self), fields(db.table = "cached_media", db.operation = "delete"))]
    pub async fn delete_stale(&self, key: &str, blob_path: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM cached_media WHERE cache_key = ? AND blob_path = ?")
            .bind(key)
            .bind(blob_path)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Structured search, most recently accessed first.
    #[tracing::instrument(skip(self), fields(db.table = "cached_media", db.operation = "select"))]
    pub async fn query(&self, filters: &SearchFilters) -> Result<Vec<CachedMedia>, AppError> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM cached_media WHERE 1 = 1");

        if let Some(brand) = filters.brand_name.as_ref() {
            qb.push(" AND brand_name = ");
            qb.push_bind(brand.clone());
        }

        if let Some(has_people) = filters.has_people {
            qb.push(" AND has_people = ");
            qb.push_bind(has_people);
        }

        let color_filter = filters
            .color_contains
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());
        if let Some(color) = color_filter {
            qb.push(" AND dominant_colors LIKE ");
            qb.push_bind(format!("%{}%", escape_like(color)));
            qb.push(" ESCAPE '\\'");
        }

        if let Some(kind) = filters.media_kind {
            qb.push(" AND media_kind = ");
            qb.push_bind(kind.as_str());
        }

        // Quick filters only count while the payload they came from still parses.
        if filters.has_people.is_some() || color_filter.is_some() {
            qb.push(" AND json_valid(analysis_results)");
        }

        qb.push(" ORDER BY last_accessed_at DESC, cache_key ASC");

        if let Some(limit) = filters.limit {
            qb.push(" LIMIT ");
            qb.push_bind(i64::from(limit));
        }

        let rows = qb
            .build_query_as::<CachedMediaRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(CachedMediaRow::into_domain).collect()
    }

    /// Delete every row downloaded at or before `cutoff`; returns their blob paths.
    #[tracing::instrument(skip(self), fields(db.table = "cached_media", db.operation = "delete"))]
    pub async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>, AppError> {
        let paths = sqlx::query_scalar::<_, String>(
            "DELETE FROM cached_media WHERE downloaded_at <= ? RETURNING blob_path",
        )
        .bind(cutoff.timestamp_micros())
        .fetch_all(&self.pool)
        .await?;

        Ok(paths)
    }

    /// Delete least recently accessed rows until the total size is at most
    /// `max_total_bytes`; returns the blob paths removed.
    #[tracing::instrument(skip(self), fields(db.table = "cached_media", db.operation = "delete"))]
    pub async fn delete_least_recently_used(
        &self,
        max_total_bytes: i64,
    ) -> Result<Vec<String>, AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(file_size_bytes), 0) FROM cached_media",
        )
        .fetch_one(&mut **tx)
        .await?;

        if total <= max_total_bytes {
            tx.commit().await?;
            return Ok(Vec::new());
        }

        let candidates = sqlx::query_as::<_, (String, String, i64)>(
            r#"
            SELECT cache_key, blob_path, file_size_bytes
            FROM cached_media
            ORDER BY last_accessed_at ASC, cache_key ASC
            "#,
        )
        .fetch_all(&mut **tx)
        .await?;

        let mut remaining = total;
        let mut removed = Vec::new();
        for (key, blob_path, size) in candidates {
            if remaining <= max_total_bytes {
                break;
            }
            sqlx::query("DELETE FROM cached_media WHERE cache_key = ?")
                .bind(&key)
                .execute(&mut **tx)
                .await?;
            remaining -= size;
            removed.push(blob_path);
        }

        tx.commit().await?;
        Ok(removed)
    }

    /// Every blob path referenced by the index
    #[tracing::instrument(skip(self), fields(db.table = "cached_media", db.operation = "select"))]
    pub async fn blob_paths(&self) -> Result<Vec<String>, AppError> {
        let paths = sqlx::query_scalar::<_, String>("SELECT blob_path FROM cached_media")
            .fetch_all(&self.pool)
            .await?;
        Ok(paths)
    }

    #[tracing::instrument(skip(self), fields(db.table = "cached_media", db.operation = "select"))]
    pub async fn stats(&self) -> Result<CacheStats, AppError> {
        let (count, total_bytes, count_with_analysis, distinct_brand_count) =
            sqlx::query_as::<_, (i64, i64, i64, i64)>(
                r#"
                SELECT COUNT(*),
                       COALESCE(SUM(file_size_bytes), 0),
                       COUNT(analysis_results),
                       COUNT(DISTINCT brand_name)
                FROM cached_media
                "#,
            )
            .fetch_one(&self.pool)
            .await?;

        let per_kind = sqlx::query_as::<_, (String, i64, i64)>(
            r#"
            SELECT media_kind, COUNT(*), COALESCE(SUM(file_size_bytes), 0)
            FROM cached_media
            GROUP BY media_kind
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut by_media_kind = BTreeMap::new();
        for (kind, count, total_bytes) in per_kind {
            match kind.parse::<MediaKind>() {
                Ok(kind) => {
                    by_media_kind.insert(kind, MediaKindStats { count, total_bytes });
                }
                Err(e) => tracing::warn!(error = %e, "Skipping unknown media kind in stats"),
            }
        }

        Ok(CacheStats::from_totals(
            count,
            total_bytes,
            count_with_analysis,
            distinct_brand_count,
            by_media_kind,
        ))
    }
}
