//! Database repositories for the cache index
//
// Cached media repository
pub mod media;
//
// Pool setup and migrations
pub mod pool;
//
// Transaction utilities
pub mod transaction;
