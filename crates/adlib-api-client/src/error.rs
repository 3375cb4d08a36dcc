use adlib_core::AppError;
use reqwest::StatusCode;

/// Failures talking to the ad library or downloading ad media.
#[derive(Debug, thiserror::Error)]
pub enum AdLibraryError {
    #[error("Ad library rejected the API key ({status}): {body}")]
    Unauthorized { status: u16, body: String },

    #[error("Ad library account is out of credits: {0}")]
    OutOfCredits(String),

    #[error("Ad library rate limit reached: {0}")]
    RateLimited(String),

    #[error("Upstream server error ({status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("Request rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMedia(String),

    #[error("Media exceeds the {limit} byte download limit")]
    TooLarge { limit: u64 },
}

impl AdLibraryError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: StatusCode, body: String) -> Self {
        match status.as_u16() {
            401 | 403 => AdLibraryError::Unauthorized {
                status: status.as_u16(),
                body,
            },
            402 => AdLibraryError::OutOfCredits(body),
            429 => AdLibraryError::RateLimited(body),
            code if status.is_server_error() => AdLibraryError::Upstream { status: code, body },
            code => AdLibraryError::Rejected { status: code, body },
        }
    }

    /// Whether the same request may succeed if tried again later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AdLibraryError::RateLimited(_)
                | AdLibraryError::Upstream { .. }
                | AdLibraryError::Network(_)
        )
    }
}

impl From<AdLibraryError> for AppError {
    fn from(err: AdLibraryError) -> Self {
        match err {
            AdLibraryError::UnsupportedMedia(_)
            | AdLibraryError::TooLarge { .. }
            | AdLibraryError::Rejected { .. } => AppError::InvalidInput(err.to_string()),
            other => AppError::Upstream(other.to_string()),
        }
    }
}
