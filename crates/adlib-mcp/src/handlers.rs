//! Tool logic
//!
//! Each handler validates its request, talks to the cache and the ad library,
//! and returns the JSON document the tool sends back. The rmcp layer in
//! `server.rs` only converts results and errors.

use std::sync::Arc;

use adlib_api_client::{AdQuery, MediaFetcher, ScrapeCreatorsClient};
use adlib_core::models::{
    compact_for_display, parse_analysis_payload, CachedMedia, MediaKind, NewCachedMedia,
    SearchFilters,
};
use adlib_core::AppError;
use adlib_services::MediaCacheService;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value as JsonValue};

use crate::prompts::{IMAGE_ANALYSIS_PROMPT, VIDEO_ANALYSIS_PROMPT};
use crate::tools::*;

pub const DEFAULT_ADS_LIMIT: u32 = 20;
pub const MAX_ADS_LIMIT: u32 = 100;

#[derive(Clone)]
pub struct AdLibraryHandlers {
    cache: Arc<MediaCacheService>,
    ad_library: Option<ScrapeCreatorsClient>,
    fetcher: MediaFetcher,
}

/// Media ready to hand to the client: either freshly downloaded or read from cache.
struct PreparedMedia {
    record: CachedMedia,
    bytes: Option<Vec<u8>>,
    cached: bool,
}

impl AdLibraryHandlers {
    pub fn new(
        cache: Arc<MediaCacheService>,
        ad_library: Option<ScrapeCreatorsClient>,
        fetcher: MediaFetcher,
    ) -> Self {
        Self {
            cache,
            ad_library,
            fetcher,
        }
    }

    pub fn cache(&self) -> &MediaCacheService {
        &self.cache
    }

    fn ad_library(&self) -> Result<&ScrapeCreatorsClient, AppError> {
        self.ad_library.as_ref().ok_or_else(|| {
            AppError::InvalidInput(
                "ScrapeCreators API key is not configured; pass --scrapecreators-api-key or set SCRAPECREATORS_API_KEY"
                    .to_string(),
            )
        })
    }

    pub async fn get_meta_platform_id(
        &self,
        req: GetMetaPlatformIdRequest,
    ) -> Result<JsonValue, AppError> {
        let brand_name = required(&req.brand_name, "brand_name")?;
        let platform_ids = self.ad_library()?.search_companies(brand_name).await?;

        let message = if platform_ids.is_empty() {
            format!(
                "No brands found matching '{}' in the Meta Ad Library. Try a different search term or check the spelling.",
                brand_name
            )
        } else {
            format!(
                "Found {} matching brand(s) for '{}' in the Meta Ad Library.",
                platform_ids.len(),
                brand_name
            )
        };

        Ok(json!({
            "success": true,
            "message": message,
            "total_results": platform_ids.len(),
            "platform_ids": platform_ids,
        }))
    }

    pub async fn get_meta_ads(&self, req: GetMetaAdsRequest) -> Result<JsonValue, AppError> {
        let platform_id = required(&req.platform_id, "platform_id")?;
        let query = AdQuery {
            limit: validate_ads_limit(req.limit)? as usize,
            country: req.country.as_deref().map(validate_country).transpose()?,
            trim: req.trim.unwrap_or(true),
        };

        let listing = self.ad_library()?.get_ads(platform_id, &query).await?;

        let message = if listing.ads.is_empty() {
            format!(
                "No current ads found for platform ID '{}' in the Meta Ad Library.",
                platform_id
            )
        } else {
            format!(
                "Retrieved {} ads for platform ID '{}' from the Meta Ad Library.",
                listing.ads.len(),
                platform_id
            )
        };

        Ok(json!({
            "success": true,
            "message": message,
            "count": listing.ads.len(),
            "has_more": listing.has_more(),
            "cursor": listing.cursor,
            "ads": listing.ads,
        }))
    }

    pub async fn analyze_ad_image(&self, req: AnalyzeAdImageRequest) -> Result<JsonValue, AppError> {
        let media_url = required(&req.media_url, "media_url")?;

        if let Some(response) = self.cached_analysis(media_url, MediaKind::Image).await? {
            return Ok(response);
        }

        let prepared = self
            .prepare(
                media_url,
                MediaKind::Image,
                req.brand_name.as_deref(),
                req.ad_id.as_deref(),
                None,
                true,
            )
            .await?;
        let record = &prepared.record;
        let image_data = prepared
            .bytes
            .as_deref()
            .map(|bytes| STANDARD.encode(bytes))
            .unwrap_or_default();

        Ok(json!({
            "success": true,
            "message": format!(
                "Prepared image from {} for analysis. {}",
                media_url,
                if prepared.cached { "Used cached image." } else { "Downloaded and cached new image." }
            ),
            "cached": prepared.cached,
            "analysis": {
                "image_url": media_url,
                "content_type": record.content_type,
                "image_size_bytes": record.file_size_bytes,
                "analysis_prompt": IMAGE_ANALYSIS_PROMPT,
                "image_data_base64": image_data,
                "ready_for_analysis": true,
                "note": "Analyze the image with the prompt above, then store the result with save_ad_analysis.",
            },
            "citation_info": citation_info(media_url, "Image", req.brand_name.as_deref(), req.ad_id.as_deref()),
            "cache_info": cache_info(record, prepared.cached),
        }))
    }

    pub async fn analyze_ad_video(&self, req: AnalyzeAdVideoRequest) -> Result<JsonValue, AppError> {
        let media_url = required(&req.media_url, "media_url")?;
        if let Some(duration) = req.duration_seconds {
            if !duration.is_finite() || duration < 0.0 {
                return Err(AppError::InvalidInput(
                    "duration_seconds must be a non-negative number".to_string(),
                ));
            }
        }

        if let Some(response) = self.cached_analysis(media_url, MediaKind::Video).await? {
            return Ok(response);
        }

        let prepared = self
            .prepare(
                media_url,
                MediaKind::Video,
                req.brand_name.as_deref(),
                req.ad_id.as_deref(),
                req.duration_seconds,
                false,
            )
            .await?;
        let record = &prepared.record;
        let location = self.cache.blob_location(record)?;

        Ok(json!({
            "success": true,
            "message": format!(
                "Prepared video from {} for analysis. {}",
                media_url,
                if prepared.cached { "Used cached video." } else { "Downloaded and cached new video." }
            ),
            "cached": prepared.cached,
            "analysis": {
                "video_url": media_url,
                "content_type": record.content_type,
                "video_size_bytes": record.file_size_bytes,
                "duration_seconds": record.duration_seconds,
                "local_path": location.display().to_string(),
                "analysis_prompt": VIDEO_ANALYSIS_PROMPT,
                "ready_for_analysis": true,
                "note": "Analyze the video file at local_path with the prompt above, then store the result with save_ad_analysis.",
            },
            "citation_info": citation_info(media_url, "Video", req.brand_name.as_deref(), req.ad_id.as_deref()),
            "cache_info": cache_info(record, prepared.cached),
        }))
    }

    pub async fn save_ad_analysis(&self, req: SaveAdAnalysisRequest) -> Result<JsonValue, AppError> {
        let media_url = required(&req.media_url, "media_url")?;
        let analysis = parse_analysis_payload(&req.analysis)?;

        let record = self.cache.record_analysis(media_url, analysis).await?;

        Ok(json!({
            "success": true,
            "message": format!("Saved analysis for {}", media_url),
            "quick_filters": record.quick_filters(),
            "analysis_cached_at": record.analysis_cached_at,
        }))
    }

    pub async fn get_cache_stats(&self) -> Result<JsonValue, AppError> {
        let stats = self.cache.statistics().await?;
        let images = stats.kind(MediaKind::Image);
        let videos = stats.kind(MediaKind::Video);

        Ok(json!({
            "success": true,
            "message": format!("Cache holds {} media files ({} MB)", stats.count, stats.total_size_mb),
            "cache_dir": self.cache.config().cache_dir.display().to_string(),
            "total_files": stats.count,
            "total_size_bytes": stats.total_bytes,
            "total_size_mb": stats.total_size_mb,
            "total_size_gb": stats.total_size_gb,
            "image_count": images.count,
            "video_count": videos.count,
            "analyzed_count": stats.count_with_analysis,
            "unique_brands": stats.distinct_brand_count,
            "by_media_kind": stats.by_media_kind,
        }))
    }

    pub async fn search_cached_media(
        &self,
        req: SearchCachedMediaRequest,
    ) -> Result<JsonValue, AppError> {
        let limit = match req.limit {
            Some(0) => {
                return Err(AppError::InvalidInput("limit must be at least 1".to_string()));
            }
            Some(limit) => limit,
            None => self.cache.config().default_search_limit,
        };

        let filters = SearchFilters {
            brand_name: optional(req.brand_name),
            has_people: req.has_people,
            color_contains: optional(req.color_contains),
            media_kind: req.media_kind.map(MediaKind::from),
            limit: Some(limit),
        };

        let results = self.cache.search(&filters).await?;
        let items: Vec<JsonValue> = results.iter().map(search_item).collect();

        Ok(json!({
            "success": true,
            "message": format!("Found {} cached media item(s)", items.len()),
            "count": items.len(),
            "results": items,
        }))
    }

    pub async fn cleanup_media_cache(
        &self,
        req: CleanupMediaCacheRequest,
    ) -> Result<JsonValue, AppError> {
        let max_age_days = req
            .max_age_days
            .unwrap_or(self.cache.config().max_cache_age_days);
        let report = self.cache.evict(max_age_days).await?;

        Ok(json!({
            "success": true,
            "message": format!(
                "Removed {} media file(s) older than {} days, freeing {} MB",
                report.removed_count, max_age_days, report.freed_mb
            ),
            "report": report,
        }))
    }

    /// Response for a URL whose analysis is already cached, if there is one.
    async fn cached_analysis(
        &self,
        media_url: &str,
        expected: MediaKind,
    ) -> Result<Option<JsonValue>, AppError> {
        let Some(record) = self.cache.lookup(media_url).await? else {
            return Ok(None);
        };
        check_kind(&record, expected)?;

        let Some(analysis) = record.analysis_results.as_ref() else {
            return Ok(None);
        };

        Ok(Some(json!({
            "success": true,
            "message": format!("Retrieved cached analysis for {}", media_url),
            "cached": true,
            "analysis": analysis,
            "cache_info": {
                "cache_status": "hit",
                "cached_at": record.downloaded_at,
                "analysis_cached_at": record.analysis_cached_at,
                "file_size": record.file_size_bytes,
                "brand_name": record.brand_name,
                "ad_id": record.ad_id,
            },
        })))
    }

    /// Cache-first media preparation. A cached blob that has gone missing
    /// is treated as a miss and downloaded again.
    async fn prepare(
        &self,
        media_url: &str,
        expected: MediaKind,
        brand_name: Option<&str>,
        ad_id: Option<&str>,
        duration_seconds: Option<f64>,
        want_bytes: bool,
    ) -> Result<PreparedMedia, AppError> {
        if let Some(record) = self.cache.lookup(media_url).await? {
            check_kind(&record, expected)?;
            if !want_bytes {
                return Ok(PreparedMedia {
                    record,
                    bytes: None,
                    cached: true,
                });
            }
            match self.cache.read_blob(&record).await {
                Ok(bytes) => {
                    return Ok(PreparedMedia {
                        record,
                        bytes: Some(bytes),
                        cached: true,
                    })
                }
                Err(AppError::NotFound(_)) => {
                    tracing::info!(media_url, "Cached blob vanished, downloading again");
                }
                Err(e) => return Err(e),
            }
        }

        let fetched = self.fetcher.fetch(media_url).await?;
        if fetched.media_kind != expected {
            return Err(AppError::InvalidInput(format!(
                "URL does not point to a valid {}. Content type: {}",
                expected, fetched.content_type
            )));
        }

        let mut media = NewCachedMedia::new(media_url, fetched.content_type.clone(), fetched.media_kind);
        media.brand_name = brand_name.map(str::to_string);
        media.ad_id = ad_id.map(str::to_string);
        media.duration_seconds = duration_seconds;

        let record = self.cache.store(media, &fetched.bytes).await?;

        Ok(PreparedMedia {
            record,
            bytes: want_bytes.then(|| fetched.bytes.to_vec()),
            cached: false,
        })
    }
}

fn required<'a>(value: &'a str, field: &str) -> Result<&'a str, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidInput(format!(
            "{} must be provided and cannot be empty",
            field
        )));
    }
    Ok(trimmed)
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Defaults to 20, rejects 0 and caps at 100.
pub fn validate_ads_limit(limit: Option<u32>) -> Result<u32, AppError> {
    match limit {
        None => Ok(DEFAULT_ADS_LIMIT),
        Some(0) => Err(AppError::InvalidInput(
            "limit must be a positive number".to_string(),
        )),
        Some(limit) => Ok(limit.min(MAX_ADS_LIMIT)),
    }
}

/// Accepts a two-letter country code and returns it upper-cased.
pub fn validate_country(country: &str) -> Result<String, AppError> {
    let country = country.trim();
    if country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::InvalidInput(format!(
            "country must be a two-letter country code, got '{}'",
            country
        )));
    }
    Ok(country.to_ascii_uppercase())
}

fn check_kind(record: &CachedMedia, expected: MediaKind) -> Result<(), AppError> {
    if record.media_kind != expected {
        let tool = match record.media_kind {
            MediaKind::Image => "analyze_ad_image",
            MediaKind::Video => "analyze_ad_video",
        };
        return Err(AppError::InvalidInput(format!(
            "{} is cached as {}; use {}",
            record.source_url, record.media_kind, tool
        )));
    }
    Ok(())
}

fn citation_info(
    media_url: &str,
    label: &str,
    brand_name: Option<&str>,
    ad_id: Option<&str>,
) -> JsonValue {
    json!({
        "markdown_link": format!("![Facebook Ad {}]({})", label, media_url),
        "clickable_reference": format!("[View Original Ad {}]({})", label, media_url),
        "source_citation": format!("*Source: Facebook Ad Library - [Original {}]({})*", label, media_url),
        "brand_context": brand_name.map(|b| format!("**Brand:** {}", b)),
        "ad_context": ad_id.map(|a| format!("**Ad ID:** {}", a)),
    })
}

fn cache_info(record: &CachedMedia, cached: bool) -> JsonValue {
    json!({
        "cache_status": if cached { "hit" } else { "miss" },
        "cache_key": record.key,
        "cached_at": record.downloaded_at,
        "brand_name": record.brand_name,
        "ad_id": record.ad_id,
    })
}

fn search_item(record: &CachedMedia) -> JsonValue {
    json!({
        "source_url": record.source_url,
        "media_kind": record.media_kind,
        "content_type": record.content_type,
        "file_size_bytes": record.file_size_bytes,
        "brand_name": record.brand_name,
        "ad_id": record.ad_id,
        "downloaded_at": record.downloaded_at,
        "last_accessed_at": record.last_accessed_at,
        "duration_seconds": record.duration_seconds,
        "dominant_colors": record.dominant_colors,
        "has_people": record.has_people,
        "text_elements": record.text_elements,
        "analysis": record.analysis_results.as_ref().map(compact_for_display),
    })
}
