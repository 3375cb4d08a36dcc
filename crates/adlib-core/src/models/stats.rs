use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::media::MediaKind;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Rounds to two decimals for human-facing sizes.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn bytes_to_mb(bytes: i64) -> f64 {
    round2(bytes as f64 / BYTES_PER_MB)
}

pub fn bytes_to_gb(bytes: i64) -> f64 {
    round2(bytes as f64 / BYTES_PER_GB)
}

/// Per media kind totals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaKindStats {
    pub count: i64,
    pub total_bytes: i64,
}

/// Aggregate cache statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub count: i64,
    pub total_bytes: i64,
    pub count_with_analysis: i64,
    pub distinct_brand_count: i64,
    pub by_media_kind: BTreeMap<MediaKind, MediaKindStats>,
    pub total_size_mb: f64,
    pub total_size_gb: f64,
}

impl CacheStats {
    pub fn from_totals(
        count: i64,
        total_bytes: i64,
        count_with_analysis: i64,
        distinct_brand_count: i64,
        by_media_kind: BTreeMap<MediaKind, MediaKindStats>,
    ) -> Self {
        Self {
            count,
            total_bytes,
            count_with_analysis,
            distinct_brand_count,
            by_media_kind,
            total_size_mb: bytes_to_mb(total_bytes),
            total_size_gb: bytes_to_gb(total_bytes),
        }
    }

    pub fn kind(&self, kind: MediaKind) -> MediaKindStats {
        self.by_media_kind.get(&kind).cloned().unwrap_or_default()
    }
}

/// Outcome of an eviction or size-limit run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvictionReport {
    pub removed_count: i64,
    pub bytes_freed: i64,
    pub freed_mb: f64,
    pub remaining_count: i64,
    pub remaining_bytes: i64,
    pub remaining_mb: f64,
    /// Files that could not be deleted; their rows are gone regardless.
    pub failed_file_deletes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_age_days: Option<u32>,
}

impl EvictionReport {
    pub fn from_stats(before: &CacheStats, after: &CacheStats, failed_file_deletes: usize) -> Self {
        let removed_count = (before.count - after.count).max(0);
        let bytes_freed = (before.total_bytes - after.total_bytes).max(0);
        Self {
            removed_count,
            bytes_freed,
            freed_mb: bytes_to_mb(bytes_freed),
            remaining_count: after.count,
            remaining_bytes: after.total_bytes,
            remaining_mb: bytes_to_mb(after.total_bytes),
            failed_file_deletes,
            max_age_days: None,
        }
    }

    pub fn with_max_age_days(mut self, days: u32) -> Self {
        self.max_age_days = Some(days);
        self
    }
}
