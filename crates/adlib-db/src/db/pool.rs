//! SQLite pool setup for the cache index

use adlib_core::{AppError, CacheConfig};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::time::Duration;

/// Open (creating if needed) the index database under the cache root and run
/// pending migrations.
pub async fn create_pool(config: &CacheConfig) -> Result<SqlitePool, AppError> {
    let path = config.index_path();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let opts = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        // Concurrent readers and a writer share the file; wait instead of failing with SQLITE_BUSY.
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(config.db_max_connections.max(1))
        .acquire_timeout(Duration::from_secs(config.db_timeout_seconds))
        .connect_with(opts)
        .await?;

    run_migrations(&pool).await?;

    tracing::info!(
        path = %path.display(),
        max_connections = config.db_max_connections,
        "Cache index opened"
    );

    Ok(pool)
}

/// Apply embedded migrations.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), AppError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
