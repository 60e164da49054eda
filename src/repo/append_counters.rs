use sqlx::Sqlite;
use uuid::Uuid;

/// Atomically allocates the next monotonic append-id value for a file.
/// Values are never reused; a rolled-back transaction leaves a gap rather
/// than rewinding the counter, since the row is only committed alongside it.
pub async fn next_value<'e, E>(executor: E, file_id: Uuid) -> Result<i64, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row: (i64,) = sqlx::query_as(
        "INSERT INTO append_counters (file_id, next_value) VALUES (?, 1)
         ON CONFLICT(file_id) DO UPDATE SET next_value = next_value + 1
         RETURNING next_value",
    )
    .bind(file_id.to_string())
    .fetch_one(executor)
    .await?;

    Ok(row.0)
}
