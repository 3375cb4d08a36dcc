//! Blob storage for the media cache
//!
//! Raw media bytes live on the local filesystem, one file per cache key.
//!
//! # Blob path format
//!
//! Blob paths are relative to the cache root: `media/{cache_key}.{ext}`, where
//! `cache_key` is the SHA-256 hex digest of the source URL and `ext` is chosen
//! from the declared content type. Paths must not contain `..` or a leading `/`.
//! Path derivation is centralized in the `keys` module.

pub mod keys;
pub mod local;
pub mod traits;

pub use keys::{blob_path_for, derive_cache_key, extension_for_content_type};
pub use local::LocalBlobStore;
pub use traits::{BlobStore, StagedBlob, StorageError, StorageResult};
