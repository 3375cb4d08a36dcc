//! Metadata index for the media cache
//!
//! SQLite-backed repositories, connection pool setup and transaction helpers.

pub mod db;

pub use db::media::CachedMediaRepository;
pub use db::pool::{create_pool, run_migrations};
pub use db::transaction::TransactionGuard;
