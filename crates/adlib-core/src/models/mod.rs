//! Domain models for the media cache

mod analysis;
mod media;
mod search;
mod stats;

pub use analysis::*;
pub use media::*;
pub use search::*;
pub use stats::*;
