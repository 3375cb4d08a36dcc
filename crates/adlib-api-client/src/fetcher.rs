use std::time::Duration;

use adlib_core::models::{normalize_content_type, MediaKind};
use adlib_core::ScrapeCreatorsConfig;
use anyhow::{Context, Result};
use bytes::{Bytes, BytesMut};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;

use crate::error::AdLibraryError;

/// Downloaded ad media
#[derive(Debug, Clone)]
pub struct FetchedMedia {
    pub bytes: Bytes,
    /// Normalized content type (lower-cased, parameters stripped)
    pub content_type: String,
    pub media_kind: MediaKind,
}

/// Downloads ad media with a request timeout and a body size cap.
#[derive(Clone, Debug)]
pub struct MediaFetcher {
    client: Client,
    max_bytes: u64,
}

impl MediaFetcher {
    pub fn new(timeout: Duration, max_bytes: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, max_bytes })
    }

    pub fn from_config(config: &ScrapeCreatorsConfig) -> Result<Self> {
        Self::new(
            Duration::from_secs(config.download_timeout_secs),
            config.max_download_bytes,
        )
    }

    /// Download `url`. Only `image/*` and `video/*` responses are accepted.
    #[tracing::instrument(skip(self), fields(http.operation = "fetch_media"))]
    pub async fn fetch(&self, url: &str) -> Result<FetchedMedia, AdLibraryError> {
        let start = std::time::Instant::now();
        let mut response = self.client.get(url.trim()).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AdLibraryError::from_status(status, body));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(normalize_content_type)
            .unwrap_or_default();
        if !is_media_content_type(&content_type) {
            return Err(AdLibraryError::UnsupportedMedia(if content_type.is_empty() {
                "missing content type".to_string()
            } else {
                content_type
            }));
        }

        if response
            .content_length()
            .is_some_and(|len| len > self.max_bytes)
        {
            return Err(AdLibraryError::TooLarge {
                limit: self.max_bytes,
            });
        }

        let mut buffer = BytesMut::new();
        while let Some(chunk) = response.chunk().await? {
            if (buffer.len() + chunk.len()) as u64 > self.max_bytes {
                return Err(AdLibraryError::TooLarge {
                    limit: self.max_bytes,
                });
            }
            buffer.extend_from_slice(&chunk);
        }

        let media_kind = MediaKind::from_content_type(&content_type);
        tracing::info!(
            content_type = %content_type,
            size_bytes = buffer.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Media downloaded"
        );

        Ok(FetchedMedia {
            bytes: buffer.freeze(),
            content_type,
            media_kind,
        })
    }
}

fn is_media_content_type(content_type: &str) -> bool {
    content_type.starts_with("image/") || content_type.starts_with("video/")
}
