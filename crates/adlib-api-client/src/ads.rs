//! Ad-library response parsing
//!
//! One [`AdRecord`] is produced per piece of media: a single record for image
//! and video ads, one per card for dynamic creative (DCO) ads. Entries without
//! a media URL or body text are dropped.

use adlib_core::models::MediaKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::AdLibraryError;

/// Creative format reported by the ad library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DisplayFormat {
    Image,
    Video,
    Dco,
}

impl DisplayFormat {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "IMAGE" => Some(DisplayFormat::Image),
            "VIDEO" => Some(DisplayFormat::Video),
            "DCO" => Some(DisplayFormat::Dco),
            _ => None,
        }
    }
}

/// A running ad with a single media URL.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdRecord {
    pub ad_id: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub display_format: DisplayFormat,
    pub media_kind: MediaKind,
    pub media_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_image_url: Option<String>,
    pub body: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawAd {
    ad_archive_id: Option<JsonValue>,
    start_date: Option<JsonValue>,
    end_date: Option<JsonValue>,
    #[serde(default)]
    snapshot: RawSnapshot,
}

#[derive(Debug, Default, Deserialize)]
struct RawSnapshot {
    display_format: Option<String>,
    body: Option<RawBody>,
    #[serde(default)]
    images: Vec<RawImage>,
    #[serde(default)]
    videos: Vec<RawVideo>,
    #[serde(default)]
    cards: Vec<RawCard>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawBody {
    Text(String),
    Object { text: Option<String> },
}

impl RawBody {
    fn text(&self) -> Option<String> {
        let text = match self {
            RawBody::Text(text) => Some(text.as_str()),
            RawBody::Object { text } => text.as_deref(),
        }?;
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct RawImage {
    resized_image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawVideo {
    video_sd_url: Option<String>,
    video_preview_image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCard {
    resized_image_url: Option<String>,
    body: Option<RawBody>,
}

/// Parse one page of `company/ads` results.
///
/// Fails only when `results` is missing. Individual entries that do not match
/// the expected shape are skipped.
pub fn parse_ads(page: &JsonValue) -> Result<Vec<AdRecord>, AdLibraryError> {
    let results = page
        .get("results")
        .and_then(JsonValue::as_array)
        .ok_or_else(|| AdLibraryError::InvalidResponse("missing `results` array".to_string()))?;

    tracing::debug!(count = results.len(), "Parsing ad library results");

    let mut ads = Vec::new();
    for entry in results {
        let raw: RawAd = match serde_json::from_value(entry.clone()) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unparseable ad entry");
                continue;
            }
        };
        ads.extend(expand_ad(raw));
    }

    Ok(ads)
}

fn expand_ad(raw: RawAd) -> Vec<AdRecord> {
    let Some(format) = raw
        .snapshot
        .display_format
        .as_deref()
        .and_then(DisplayFormat::parse)
    else {
        return Vec::new();
    };

    let ad_id = raw.ad_archive_id.as_ref().and_then(id_string);
    let start_date = raw.start_date.as_ref().and_then(unix_seconds);
    let end_date = raw.end_date.as_ref().and_then(unix_seconds);
    let snapshot_body = raw.snapshot.body.as_ref().and_then(RawBody::text);

    let record = |media_url: Option<&String>,
                  body: Option<String>,
                  media_kind: MediaKind,
                  preview_image_url: Option<String>| {
        let media_url = media_url.map(|u| u.trim()).filter(|u| !u.is_empty())?;
        Some(AdRecord {
            ad_id: ad_id.clone(),
            start_date,
            end_date,
            display_format: format,
            media_kind,
            media_url: media_url.to_string(),
            preview_image_url,
            body: body?,
        })
    };

    match format {
        DisplayFormat::Image => raw
            .snapshot
            .images
            .first()
            .and_then(|image| {
                record(
                    image.resized_image_url.as_ref(),
                    snapshot_body,
                    MediaKind::Image,
                    None,
                )
            })
            .into_iter()
            .collect(),
        DisplayFormat::Video => raw
            .snapshot
            .videos
            .first()
            .and_then(|video| {
                record(
                    video.video_sd_url.as_ref(),
                    snapshot_body,
                    MediaKind::Video,
                    video.video_preview_image_url.clone(),
                )
            })
            .into_iter()
            .collect(),
        DisplayFormat::Dco => raw
            .snapshot
            .cards
            .iter()
            .filter_map(|card| {
                record(
                    card.resized_image_url.as_ref(),
                    card.body.as_ref().and_then(RawBody::text),
                    MediaKind::Image,
                    None,
                )
            })
            .collect(),
    }
}

fn id_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn unix_seconds(value: &JsonValue) -> Option<DateTime<Utc>> {
    let seconds = value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))?;
    DateTime::<Utc>::from_timestamp(seconds, 0)
}
