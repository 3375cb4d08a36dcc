use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::analysis::QuickFilters;

/// Kind of cached media
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    /// Infers the kind from a declared content type. Anything that is not
    /// `video/*` is treated as an image.
    pub fn from_content_type(content_type: &str) -> Self {
        if normalize_content_type(content_type).starts_with("video/") {
            MediaKind::Video
        } else {
            MediaKind::Image
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(MediaKind::Image),
            "video" => Ok(MediaKind::Video),
            other => Err(format!("Unknown media kind: {}", other)),
        }
    }
}

/// Lower-cases a content type and strips MIME parameters.
pub fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// One cached media item: provenance, blob location and analysis state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedMedia {
    pub key: String,
    pub source_url: String,
    pub blob_path: String,
    pub content_type: String,
    pub file_size_bytes: i64,
    pub media_kind: MediaKind,
    pub downloaded_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub duration_seconds: Option<f64>,
    pub brand_name: Option<String>,
    pub ad_id: Option<String>,
    pub analysis_results: Option<JsonValue>,
    pub analysis_cached_at: Option<DateTime<Utc>>,
    pub dominant_colors: Option<String>,
    pub has_people: Option<bool>,
    pub text_elements: Option<String>,
}

impl CachedMedia {
    pub fn has_analysis(&self) -> bool {
        self.analysis_results.is_some()
    }

    pub fn quick_filters(&self) -> QuickFilters {
        QuickFilters {
            dominant_colors: self.dominant_colors.clone(),
            has_people: self.has_people,
            text_elements: self.text_elements.clone(),
        }
    }
}

/// Input for storing downloaded bytes in the cache.
#[derive(Debug, Clone)]
pub struct NewCachedMedia {
    pub source_url: String,
    pub content_type: String,
    pub media_kind: MediaKind,
    pub brand_name: Option<String>,
    pub ad_id: Option<String>,
    pub duration_seconds: Option<f64>,
}

impl NewCachedMedia {
    pub fn new(source_url: impl Into<String>, content_type: impl Into<String>, media_kind: MediaKind) -> Self {
        Self {
            source_url: source_url.into(),
            content_type: content_type.into(),
            media_kind,
            brand_name: None,
            ad_id: None,
            duration_seconds: None,
        }
    }

    pub fn with_brand(mut self, brand_name: impl Into<String>) -> Self {
        self.brand_name = Some(brand_name.into());
        self
    }

    pub fn with_ad_id(mut self, ad_id: impl Into<String>) -> Self {
        self.ad_id = Some(ad_id.into());
        self
    }

    pub fn with_duration(mut self, duration_seconds: f64) -> Self {
        self.duration_seconds = Some(duration_seconds);
        self
    }
}
