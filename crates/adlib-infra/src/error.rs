//! Tool error payloads
//!
//! [`ErrorResponse`] is the structured body attached to failed tool calls.
//! Sensitive errors (database, disk, internal) only expose their client
//! message; the full chain goes to the log.

use adlib_core::{AppError, ErrorMetadata, LogLevel};
use serde::Serialize;

/// Standard error body for tool responses
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

impl ErrorResponse {
    /// Build the response for `err` and log it at the variant's level.
    /// Details are included only outside production and never for sensitive errors.
    pub fn from_app_error(err: &AppError, is_production: bool) -> Self {
        log_app_error(err);

        let expose = !is_production && !err.is_sensitive();
        Self {
            error: err.client_message(),
            error_code: err.error_code().to_string(),
            recoverable: err.is_recoverable(),
            suggested_action: err.suggested_action().map(str::to_string),
            details: expose.then(|| err.detailed_message()),
            error_type: expose.then(|| err.error_type().to_string()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({ "error": self.error }))
    }
}

fn log_app_error(err: &AppError) {
    let details = err.detailed_message();
    match err.log_level() {
        LogLevel::Debug => tracing::debug!(error_code = err.error_code(), "{}", details),
        LogLevel::Warn => tracing::warn!(error_code = err.error_code(), "{}", details),
        LogLevel::Error => tracing::error!(error_code = err.error_code(), "{}", details),
    }
}
