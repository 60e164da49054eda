use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::idempotency::IdempotencyRecord;

pub async fn fetch(
    db: &SqlitePool,
    key: &str,
    capability_key_id: Uuid,
) -> Result<Option<IdempotencyRecord>, sqlx::Error> {
    sqlx::query_as::<_, IdempotencyRecord>(
        "SELECT key, capability_key_id, response_status, response_body, created_at
         FROM idempotency_keys WHERE key = ? AND capability_key_id = ?",
    )
    .bind(key)
    .bind(capability_key_id.to_string())
    .fetch_optional(db)
    .await
}

/// Attempts to become the owner of a pending idempotency key by inserting a
/// placeholder row with `response_status = 0`. Returns `true` if this call
/// won ownership, `false` if a row (pending or finalized) already existed.
pub async fn try_claim(
    db: &SqlitePool,
    key: &str,
    capability_key_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO idempotency_keys (key, capability_key_id, response_status, response_body, created_at)
         VALUES (?, ?, 0, '', ?)
         ON CONFLICT(key, capability_key_id) DO NOTHING",
    )
    .bind(key)
    .bind(capability_key_id.to_string())
    .bind(Utc::now())
    .execute(db)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Writes the final status/body iff the row is still pending. A second call
/// against an already-finalized key is a no-op rather than an overwrite.
pub async fn finalize(
    db: &SqlitePool,
    key: &str,
    capability_key_id: Uuid,
    response_status: i64,
    response_body: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE idempotency_keys SET response_status = ?, response_body = ?
         WHERE key = ? AND capability_key_id = ? AND response_status = 0",
    )
    .bind(response_status)
    .bind(response_body)
    .bind(key)
    .bind(capability_key_id.to_string())
    .execute(db)
    .await?;
    Ok(())
}

/// Removes a pending placeholder row so a later request can retry, used
/// when the owning request fails before producing a result to cache.
pub async fn clear_pending(
    db: &SqlitePool,
    key: &str,
    capability_key_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "DELETE FROM idempotency_keys WHERE key = ? AND capability_key_id = ? AND response_status = 0",
    )
    .bind(key)
    .bind(capability_key_id.to_string())
    .execute(db)
    .await?;
    Ok(())
}
