pub mod media_cache;

pub use media_cache::MediaCacheService;
