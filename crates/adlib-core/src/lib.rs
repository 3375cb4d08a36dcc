//! Ad-library core
//!
//! Domain models, error types and configuration shared by the media cache,
//! the ad-library client and the MCP server.

pub mod config;
pub mod error;
pub mod models;

pub use config::{CacheConfig, Config, ScrapeCreatorsConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
