//! Ad-library services layer
//!
//! Hosts the media cache facade that coordinates the blob store and the
//! metadata index, and the background cleanup service. Binaries (MCP server,
//! CLI) depend on this crate rather than on storage or db directly.

pub mod cleanup;
pub mod services;

pub use cleanup::{CleanupService, CleanupSummary};
pub use services::MediaCacheService;

pub use adlib_storage::{derive_cache_key, BlobStore, LocalBlobStore, StorageError};
