//! MCP tool request types with JSON Schema for AI parameter generation

use adlib_core::models::MediaKind;
use schemars::JsonSchema;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetMetaPlatformIdRequest {
    #[schemars(description = "Brand or company name as it appears on Meta, e.g. \"Nike\"")]
    pub brand_name: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetMetaAdsRequest {
    #[schemars(description = "Meta Platform ID returned by get_meta_platform_id")]
    pub platform_id: String,
    #[schemars(description = "Maximum number of ads to return (default 20, max 100)")]
    pub limit: Option<u32>,
    #[schemars(description = "Two-letter country code to filter ads by, e.g. \"US\"")]
    pub country: Option<String>,
    #[schemars(description = "Request trimmed ad payloads (default true)")]
    pub trim: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AnalyzeAdImageRequest {
    #[schemars(description = "Direct URL of the ad image (jpg, png, gif, webp)")]
    pub media_url: String,
    #[schemars(description = "Brand name stored with the cached image")]
    pub brand_name: Option<String>,
    #[schemars(description = "Ad ID stored with the cached image")]
    pub ad_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AnalyzeAdVideoRequest {
    #[schemars(description = "Direct URL of the ad video (mp4, mov, webm)")]
    pub media_url: String,
    #[schemars(description = "Brand name stored with the cached video")]
    pub brand_name: Option<String>,
    #[schemars(description = "Ad ID stored with the cached video")]
    pub ad_id: Option<String>,
    #[schemars(description = "Video duration in seconds, if known")]
    pub duration_seconds: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SaveAdAnalysisRequest {
    #[schemars(description = "URL of the media the analysis describes; it must already be cached")]
    pub media_url: String,
    #[schemars(description = "Analysis as a JSON object (or a string containing one)")]
    pub analysis: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchCachedMediaRequest {
    #[schemars(description = "Exact brand name")]
    pub brand_name: Option<String>,
    #[schemars(description = "Only media whose analysis found (true) or did not find (false) people")]
    pub has_people: Option<bool>,
    #[schemars(description = "Substring of the dominant colors, e.g. \"red\"")]
    pub color_contains: Option<String>,
    #[schemars(description = "Kind of media to return")]
    pub media_kind: Option<MediaKindParam>,
    #[schemars(description = "Maximum number of results to return")]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Copy, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum MediaKindParam {
    Image,
    Video,
}

impl From<MediaKindParam> for MediaKind {
    fn from(param: MediaKindParam) -> Self {
        match param {
            MediaKindParam::Image => MediaKind::Image,
            MediaKindParam::Video => MediaKind::Video,
        }
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CleanupMediaCacheRequest {
    #[schemars(description = "Remove media downloaded this many days ago or earlier (default 30)")]
    pub max_age_days: Option<u32>,
}
