//! Ad-library HTTP clients.
//!
//! [`ScrapeCreatorsClient`] searches brands and lists their running ads;
//! [`MediaFetcher`] downloads the ad media that the cache stores. Both are
//! plain `reqwest` clients shared by the MCP server.

pub mod ads;
pub mod error;
pub mod fetcher;
pub mod scrapecreators;

pub use ads::{parse_ads, AdRecord, DisplayFormat};
pub use error::AdLibraryError;
pub use fetcher::{FetchedMedia, MediaFetcher};
pub use scrapecreators::{AdListing, AdQuery, ScrapeCreatorsClient};
