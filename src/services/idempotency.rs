use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::config::IdempotencySettings;
use crate::error::{AppError, ErrorCode};
use crate::repo::idempotency as repo;

/// Outcome of attempting to become the owner of an idempotency token.
pub enum Claim {
    /// This request is the owner and must compute and `finalize` a result.
    Owner,
    /// A prior request already finalized a result under this token.
    Cached { status: u16, body: serde_json::Value },
    /// A prior request is still computing; the caller should wait.
    Pending,
}

/// Attempts to claim ownership of `key` for `capability_key_id`. `now` is
/// unused on the write path itself (the row's timestamp comes from the
/// database clock) but threaded through for symmetry with the rest of the
/// request's single `now` capture.
pub async fn claim(
    db: &SqlitePool,
    key: &str,
    capability_key_id: Uuid,
    _now: DateTime<Utc>,
) -> Result<Claim, AppError> {
    if repo::try_claim(db, key, capability_key_id).await? {
        return Ok(Claim::Owner);
    }

    match repo::fetch(db, key, capability_key_id).await? {
        Some(record) if !record.is_pending() => match parse_cached(&record.response_body) {
            Some((status, body)) => Ok(Claim::Cached { status, body }),
            None => Ok(Claim::Pending),
        },
        _ => Ok(Claim::Pending),
    }
}

/// Polls a pending idempotency row until it is finalized or the configured
/// timeout elapses, per the broker's wait/poll contract.
pub async fn wait_for_result(
    db: &SqlitePool,
    key: &str,
    capability_key_id: Uuid,
    settings: &IdempotencySettings,
) -> Result<(u16, serde_json::Value), AppError> {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(settings.wait_timeout_ms);

    loop {
        if let Some(record) = repo::fetch(db, key, capability_key_id).await? {
            if !record.is_pending() {
                if let Some(cached) = parse_cached(&record.response_body) {
                    return Ok(cached);
                }
            }
        }

        if tokio::time::Instant::now() >= deadline {
            return Err(AppError::new(
                ErrorCode::IdempotencyConflict,
                "timed out waiting for the owning request to finish",
            ));
        }

        tokio::time::sleep(Duration::from_millis(settings.poll_interval_ms)).await;
    }
}

pub async fn finalize(
    db: &SqlitePool,
    key: &str,
    capability_key_id: Uuid,
    status: u16,
    body: &serde_json::Value,
) -> Result<(), AppError> {
    let serialized = serde_json::to_string(&envelope_for_cache(status, body))?;
    repo::finalize(db, key, capability_key_id, status as i64, &serialized).await?;
    Ok(())
}

pub async fn clear_pending(
    db: &SqlitePool,
    key: &str,
    capability_key_id: Uuid,
) -> Result<(), AppError> {
    repo::clear_pending(db, key, capability_key_id).await?;
    Ok(())
}

fn parse_cached(body: &str) -> Option<(u16, serde_json::Value)> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let status = value.get("__status")?.as_u64()? as u16;
    let inner = value.get("__body")?.clone();
    Some((status, inner))
}

/// Wraps a finalized body together with the HTTP status it was served with,
/// since the idempotency table stores a single JSON payload per row.
pub fn envelope_for_cache(status: u16, body: &serde_json::Value) -> serde_json::Value {
    serde_json::json!({ "__status": status, "__body": body })
}
