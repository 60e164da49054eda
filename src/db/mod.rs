use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use crate::config::DatabaseSettings;

/// Connects to the configured SQLite database and runs pending migrations.
/// A single connection pool is shared across the process; the "single
/// writer" assumption in the design means we don't attempt to scale writer
/// concurrency beyond what SQLite's own locking provides.
pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(16)
        .connect_with(settings.connect_options())
        .await?;

    sqlx::migrate!("src/db/migrations").run(&pool).await?;

    Ok(pool)
}
