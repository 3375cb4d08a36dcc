use serde::{Deserialize, Serialize};

use super::media::MediaKind;

/// Filters for searching cached media. All fields are optional and combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    /// Exact brand name
    pub brand_name: Option<String>,
    pub has_people: Option<bool>,
    /// Substring of the comma-joined dominant colors
    pub color_contains: Option<String>,
    pub media_kind: Option<MediaKind>,
    pub limit: Option<u32>,
}

impl SearchFilters {
    pub fn brand(brand_name: impl Into<String>) -> Self {
        Self {
            brand_name: Some(brand_name.into()),
            ..Default::default()
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}
