use chrono::{DateTime, Utc};
use sqlx::{Connection, SqlitePool};
use uuid::Uuid;

use crate::config::ClaimSettings;
use crate::error::AppError;
use crate::models::file::File;
use crate::models::request::{AppendItem, ParsedRequest};
use crate::services::append_machine::{self, AppendContext, AppendOutcome};
use crate::services::events::Event;

/// Runs every item in `request` under one write transaction, started with
/// `BEGIN IMMEDIATE` so the claim protocol's serialization requirement holds
/// even when a claim item shares a batch with other append types. Any
/// handler error rolls back the whole batch — no partial effects survive.
/// `now` is captured once by the caller at request entry and threaded
/// through unchanged, so every append's timestamps agree with the
/// authorization and idempotency decisions made earlier in the same request.
pub async fn execute(
    db: &SqlitePool,
    file: &File,
    workspace_id: Uuid,
    request: &ParsedRequest,
    claim_settings: &ClaimSettings,
    now: DateTime<Utc>,
) -> Result<Vec<AppendOutcome>, AppError> {
    for item in &request.items {
        append_machine::preflight(item, claim_settings)?;
    }

    let mut conn = db.acquire().await?;
    let mut tx = conn.begin_with("BEGIN IMMEDIATE").await?;

    let ctx = AppendContext {
        file,
        workspace_id,
        author: &request.author,
        now,
        claim_settings,
    };

    let mut outcomes = Vec::with_capacity(request.items.len());
    for item in &request.items {
        match append_machine::handle(&mut tx, &ctx, item).await {
            Ok(outcome) => outcomes.push(outcome),
            Err(err) => {
                tx.rollback().await?;
                return Err(err);
            }
        }
    }

    tx.commit().await?;
    Ok(outcomes)
}

pub fn events_for(file_path: &str, workspace_id: Uuid, outcomes: &[AppendOutcome], now: chrono::DateTime<chrono::Utc>) -> Vec<Event> {
    outcomes
        .iter()
        .map(|outcome| Event {
            workspace_id,
            file_path: file_path.to_string(),
            name: outcome.event_name,
            data: outcome.event_data.clone(),
            timestamp: now,
        })
        .collect()
}

/// Whether this request is a single-append call, used by the dispatcher to
/// decide between the single-item and batch response envelope shapes.
pub fn single_item(request: &ParsedRequest) -> Option<&AppendItem> {
    if request.items.len() == 1 {
        request.items.first()
    } else {
        None
    }
}
