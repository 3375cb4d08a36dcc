//! Analysis payloads and the quick-filter fields materialized from them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::error::AppError;

/// Placeholder substituted for inline binary payloads in compact output.
pub const ELIDED_IMAGE_DATA: &str = "[Image data available]";

/// Strings longer than this are truncated in compact output.
pub const MAX_COMPACT_STRING_LEN: usize = 1000;

/// Searchable fields derived from an analysis payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuickFilters {
    pub dominant_colors: Option<String>,
    pub has_people: Option<bool>,
    pub text_elements: Option<String>,
}

impl QuickFilters {
    /// Extracts the quick-filter fields. Missing or mistyped sub-fields give
    /// `None` (colors, text) or `false` (people) instead of an error.
    pub fn extract(analysis: &JsonValue) -> Self {
        Self {
            dominant_colors: extract_dominant_colors(analysis),
            has_people: Some(extract_has_people(analysis)),
            text_elements: extract_text_elements(analysis),
        }
    }
}

/// Rejects payloads that are not key/value documents.
pub fn validate_analysis_payload(analysis: &JsonValue) -> Result<(), AppError> {
    match analysis {
        JsonValue::Object(map) if !map.is_empty() => Ok(()),
        JsonValue::Object(_) => Err(AppError::MalformedAnalysis(
            "Analysis payload must not be empty".to_string(),
        )),
        other => Err(AppError::MalformedAnalysis(format!(
            "Analysis payload must be a JSON object, got {}",
            json_type_name(other)
        ))),
    }
}

/// Parses an analysis document sent as text. Accepts a JSON object or a
/// string containing one.
pub fn parse_analysis_payload(raw: &JsonValue) -> Result<JsonValue, AppError> {
    let value = match raw {
        JsonValue::String(s) => serde_json::from_str::<JsonValue>(s)?,
        other => other.clone(),
    };
    validate_analysis_payload(&value)?;
    Ok(value)
}

fn extract_dominant_colors(analysis: &JsonValue) -> Option<String> {
    let colors = analysis.get("colors")?.get("dominant_colors")?.as_array()?;
    let names: Vec<&str> = colors
        .iter()
        .filter_map(JsonValue::as_str)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect();
    if names.is_empty() {
        None
    } else {
        Some(names.join(","))
    }
}

fn extract_has_people(analysis: &JsonValue) -> bool {
    analysis
        .get("people_description")
        .and_then(JsonValue::as_str)
        .map(|s| !s.trim().is_empty())
        .unwrap_or(false)
}

fn extract_text_elements(analysis: &JsonValue) -> Option<String> {
    let elements = analysis.get("text_elements")?.as_object()?;
    let mut all_text = Vec::new();
    for texts in elements.values() {
        match texts {
            JsonValue::Array(items) => {
                all_text.extend(items.iter().filter_map(JsonValue::as_str).map(str::to_string))
            }
            JsonValue::String(s) => all_text.push(s.clone()),
            _ => {}
        }
    }
    if all_text.is_empty() {
        None
    } else {
        Some(all_text.join(" | "))
    }
}

/// Returns a copy with inline base64 payloads replaced by a placeholder and
/// long strings truncated.
pub fn compact_for_display(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, v) in map {
                if is_binary_field(key) && v.is_string() {
                    out.insert(key.clone(), JsonValue::String(ELIDED_IMAGE_DATA.to_string()));
                } else {
                    out.insert(key.clone(), compact_for_display(v));
                }
            }
            JsonValue::Object(out)
        }
        JsonValue::Array(items) => JsonValue::Array(items.iter().map(compact_for_display).collect()),
        JsonValue::String(s) if s.starts_with("data:") && s.contains(";base64,") => {
            JsonValue::String(ELIDED_IMAGE_DATA.to_string())
        }
        JsonValue::String(s) if s.chars().count() > MAX_COMPACT_STRING_LEN => {
            let kept: String = s.chars().take(MAX_COMPACT_STRING_LEN).collect();
            let dropped = s.chars().count() - MAX_COMPACT_STRING_LEN;
            JsonValue::String(format!("{}... [truncated {} chars]", kept, dropped))
        }
        other => other.clone(),
    }
}

fn is_binary_field(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.ends_with("base64") || key == "image_data" || key == "video_data"
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_full_payload() {
        let analysis = json!({
            "colors": {"dominant_colors": ["red", "white", "black"]},
            "people_description": "Two runners, mid-20s",
            "text_elements": {
                "headline": ["Just Do It"],
                "cta": "Shop Now",
                "ignored": 42
            }
        });
        let filters = QuickFilters::extract(&analysis);
        assert_eq!(filters.dominant_colors.as_deref(), Some("red,white,black"));
        assert_eq!(filters.has_people, Some(true));
        let text = filters.text_elements.unwrap();
        assert!(text.contains("Just Do It"));
        assert!(text.contains("Shop Now"));
        assert!(text.contains(" | "));
    }

    #[test]
    fn test_extract_degrades_on_missing_fields() {
        let filters = QuickFilters::extract(&json!({"summary": "plain product shot"}));
        assert_eq!(filters.dominant_colors, None);
        assert_eq!(filters.has_people, Some(false));
        assert_eq!(filters.text_elements, None);
    }

    #[test]
    fn test_extract_degrades_on_wrong_types() {
        let analysis = json!({
            "colors": "red",
            "people_description": {"count": 2},
            "text_elements": ["not", "a", "map"]
        });
        let filters = QuickFilters::extract(&analysis);
        assert_eq!(filters.dominant_colors, None);
        assert_eq!(filters.has_people, Some(false));
        assert_eq!(filters.text_elements, None);
    }

    #[test]
    fn test_blank_people_description() {
        let filters = QuickFilters::extract(&json!({"people_description": "   "}));
        assert_eq!(filters.has_people, Some(false));
    }

    #[test]
    fn test_validate_payload() {
        assert!(validate_analysis_payload(&json!({"a": 1})).is_ok());
        assert!(matches!(
            validate_analysis_payload(&json!([1, 2])),
            Err(AppError::MalformedAnalysis(_))
        ));
        assert!(matches!(
            validate_analysis_payload(&json!({})),
            Err(AppError::MalformedAnalysis(_))
        ));
    }

    #[test]
    fn test_parse_payload_from_string() {
        let parsed = parse_analysis_payload(&json!("{\"colors\": {}}")).unwrap();
        assert!(parsed.get("colors").is_some());
        assert!(parse_analysis_payload(&json!("not json")).is_err());
        assert!(parse_analysis_payload(&json!("\"just a string\"")).is_err());
    }

    #[test]
    fn test_compact_elides_binary_and_truncates() {
        let long = "x".repeat(MAX_COMPACT_STRING_LEN + 10);
        let value = json!({
            "image_data_base64": "iVBORw0KGgo=",
            "nested": {"thumb": "data:image/png;base64,AAAA"},
            "notes": long,
            "count": 3
        });
        let compact = compact_for_display(&value);
        assert_eq!(compact["image_data_base64"], ELIDED_IMAGE_DATA);
        assert_eq!(compact["nested"]["thumb"], ELIDED_IMAGE_DATA);
        assert!(compact["notes"]
            .as_str()
            .unwrap()
            .ends_with("[truncated 10 chars]"));
        assert_eq!(compact["count"], 3);
    }
}
