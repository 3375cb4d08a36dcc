mod cached_media;
mod row;

pub use cached_media::CachedMediaRepository;
