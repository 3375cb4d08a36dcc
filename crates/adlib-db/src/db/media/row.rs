use adlib_core::models::{CachedMedia, MediaKind};
use adlib_core::AppError;
use chrono::{DateTime, Utc};

/// Database row for `cached_media`.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct CachedMediaRow {
    pub cache_key: String,
    pub source_url: String,
    pub blob_path: String,
    pub content_type: String,
    pub file_size_bytes: i64,
    pub media_kind: String,
    pub downloaded_at: i64,
    pub last_accessed_at: i64,
    pub duration_seconds: Option<f64>,
    pub brand_name: Option<String>,
    pub ad_id: Option<String>,
    pub analysis_results: Option<String>,
    pub analysis_cached_at: Option<i64>,
    pub dominant_colors: Option<String>,
    pub has_people: Option<bool>,
    pub text_elements: Option<String>,
}

pub(crate) fn from_micros(micros: i64) -> Result<DateTime<Utc>, AppError> {
    DateTime::<Utc>::from_timestamp_micros(micros)
        .ok_or_else(|| AppError::Internal(format!("Timestamp out of range: {}", micros)))
}

impl CachedMediaRow {
    pub fn into_domain(self) -> Result<CachedMedia, AppError> {
        let media_kind = self
            .media_kind
            .parse::<MediaKind>()
            .map_err(AppError::Internal)?;

        // A row whose payload no longer parses is reported as unanalyzed,
        // including the quick-filter fields derived from that payload.
        let analysis = match (self.analysis_results.as_deref(), self.analysis_cached_at) {
            (Some(raw), Some(at)) => match serde_json::from_str(raw) {
                Ok(value) => Some((value, from_micros(at)?)),
                Err(e) => {
                    tracing::warn!(
                        cache_key = %self.cache_key,
                        error = %e,
                        "Stored analysis payload is not valid JSON; ignoring it"
                    );
                    None
                }
            },
            _ => None,
        };

        let (analysis_results, analysis_cached_at, dominant_colors, has_people, text_elements) =
            match analysis {
                Some((value, at)) => (
                    Some(value),
                    Some(at),
                    self.dominant_colors,
                    self.has_people,
                    self.text_elements,
                ),
                None => (None, None, None, None, None),
            };

        Ok(CachedMedia {
            key: self.cache_key,
            source_url: self.source_url,
            blob_path: self.blob_path,
            content_type: self.content_type,
            file_size_bytes: self.file_size_bytes,
            media_kind,
            downloaded_at: from_micros(self.downloaded_at)?,
            last_accessed_at: from_micros(self.last_accessed_at)?,
            duration_seconds: self.duration_seconds,
            brand_name: self.brand_name,
            ad_id: self.ad_id,
            analysis_results,
            analysis_cached_at,
            dominant_colors,
            has_people,
            text_elements,
        })
    }
}
