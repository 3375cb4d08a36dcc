//! Cache key and blob path derivation.
//!
//! Key format: SHA-256 of the trimmed source URL as 64 lowercase hex characters.
//! Blob path format: `media/{key}.{ext}`.

use adlib_core::models::normalize_content_type;
use sha2::{Digest, Sha256};

/// Directory (relative to the cache root) holding blob files.
pub const MEDIA_PREFIX: &str = "media";

/// Extension used when the content type is not recognized.
pub const DEFAULT_EXTENSION: &str = "jpg";

/// Derive the cache key for a source URL.
///
/// Only surrounding whitespace is normalized away; query strings are kept since
/// signed CDN URLs differ only there.
pub fn derive_cache_key(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.trim().as_bytes());
    hex::encode(hasher.finalize())
}

/// Map a declared content type to a file extension.
pub fn extension_for_content_type(content_type: &str) -> &'static str {
    match normalize_content_type(content_type).as_str() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "video/mp4" => "mp4",
        "video/quicktime" => "mov",
        "video/webm" => "webm",
        _ => DEFAULT_EXTENSION,
    }
}

/// Relative blob path for a cache key and content type.
pub fn blob_path_for(key: &str, content_type: &str) -> String {
    format!(
        "{}/{}.{}",
        MEDIA_PREFIX,
        key,
        extension_for_content_type(content_type)
    )
}
