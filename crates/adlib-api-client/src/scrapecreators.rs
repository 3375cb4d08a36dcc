//! ScrapeCreators ad-library client
//!
//! Wraps the two endpoints the tools need: company search and the paginated
//! ads listing for a page id. Authentication is the `x-api-key` header.

use std::collections::BTreeMap;
use std::time::Duration;

use adlib_core::ScrapeCreatorsConfig;
use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::ads::{parse_ads, AdRecord};
use crate::error::AdLibraryError;

const SEARCH_COMPANIES_PATH: &str = "/v1/facebook/adLibrary/search/companies";
const COMPANY_ADS_PATH: &str = "/v1/facebook/adLibrary/company/ads";
const API_KEY_HEADER: &str = "x-api-key";
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Parameters for listing a page's running ads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdQuery {
    pub limit: usize,
    /// Two-letter country code
    pub country: Option<String>,
    /// Ask the API for trimmed payloads
    pub trim: bool,
}

impl Default for AdQuery {
    fn default() -> Self {
        Self {
            limit: 20,
            country: None,
            trim: true,
        }
    }
}

/// Ads collected for a page, plus the cursor for the next page if the API
/// reported one.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AdListing {
    pub ads: Vec<AdRecord>,
    pub cursor: Option<String>,
}

impl AdListing {
    pub fn has_more(&self) -> bool {
        self.cursor.is_some()
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default, rename = "searchResults")]
    search_results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    name: Option<String>,
    page_id: Option<JsonValue>,
}

#[derive(Clone, Debug)]
pub struct ScrapeCreatorsClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl ScrapeCreatorsClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Build a client from settings; fails when no API key is configured.
    pub fn from_config(config: &ScrapeCreatorsConfig) -> Result<Self> {
        let api_key = config.require_api_key()?;
        Self::new(config.base_url.clone(), api_key)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Search the ad library for brands. Returns brand name to page id.
    #[tracing::instrument(skip(self), fields(http.endpoint = "search_companies"))]
    pub async fn search_companies(
        &self,
        brand_name: &str,
    ) -> Result<BTreeMap<String, String>, AdLibraryError> {
        let body = self
            .get_json(SEARCH_COMPANIES_PATH, &[("query", brand_name.to_string())])
            .await?;

        let response: SearchResponse = serde_json::from_value(body)
            .map_err(|e| AdLibraryError::InvalidResponse(e.to_string()))?;

        let companies: BTreeMap<String, String> = response
            .search_results
            .into_iter()
            .filter_map(|result| {
                let page_id = match result.page_id? {
                    JsonValue::String(s) => s,
                    JsonValue::Number(n) => n.to_string(),
                    _ => return None,
                };
                Some((result.name?, page_id))
            })
            .collect();

        tracing::info!(matches = companies.len(), "Ad library company search completed");
        Ok(companies)
    }

    /// Collect up to `query.limit` ads for `page_id`, following the cursor.
    ///
    /// A failure on the first page is returned. A failure on a later page ends
    /// pagination and the ads collected so far are returned.
    #[tracing::instrument(skip(self, query), fields(http.endpoint = "company_ads", limit = query.limit))]
    pub async fn get_ads(
        &self,
        page_id: &str,
        query: &AdQuery,
    ) -> Result<AdListing, AdLibraryError> {
        let mut ads: Vec<AdRecord> = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;

        while ads.len() < query.limit {
            let mut params = vec![("pageId", page_id.to_string())];
            if let Some(c) = &cursor {
                params.push(("cursor", c.clone()));
            }
            if let Some(country) = &query.country {
                params.push(("country", country.clone()));
            }
            params.push(("trim", query.trim.to_string()));

            let page = match self.get_json(COMPANY_ADS_PATH, &params).await {
                Ok(page) => page,
                Err(e) if pages > 0 => {
                    tracing::warn!(error = %e, pages, "Ad pagination stopped early");
                    break;
                }
                Err(e) => return Err(e),
            };
            pages += 1;

            let parsed = parse_ads(&page)?;
            if parsed.is_empty() {
                cursor = None;
                break;
            }
            ads.extend(parsed);

            let next = page
                .get("cursor")
                .and_then(JsonValue::as_str)
                .filter(|c| !c.is_empty())
                .map(str::to_string);
            // A repeated cursor would loop forever.
            if next.is_none() || next == cursor {
                cursor = None;
                break;
            }
            cursor = next;
        }

        ads.truncate(query.limit);
        tracing::info!(count = ads.len(), pages, "Fetched ads from ad library");

        Ok(AdListing { ads, cursor })
    }

    async fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<JsonValue, AdLibraryError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, self.api_key.as_str())
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!(status = status.as_u16(), path, "Ad library request failed");
            return Err(AdLibraryError::from_status(status, body));
        }

        response
            .json::<JsonValue>()
            .await
            .map_err(|e| AdLibraryError::InvalidResponse(e.to_string()))
    }
}
