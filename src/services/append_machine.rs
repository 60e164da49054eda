use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::json;
use sha2::{Digest, Sha256};
use sqlx::{Sqlite, Transaction};
use uuid::Uuid;

use crate::config::ClaimSettings;
use crate::error::{AppError, ErrorCode};
use crate::models::append::{self, Append, AppendType, APPEND_MAX_SIZE_BYTES};
use crate::models::file::File;
use crate::models::request::AppendItem;
use crate::repo::{append_counters, appends};

const CONTENT_PREVIEW_CHARS: usize = 200;

pub struct AppendContext<'a> {
    pub file: &'a File,
    pub workspace_id: Uuid,
    pub author: &'a str,
    pub now: DateTime<Utc>,
    pub claim_settings: &'a ClaimSettings,
}

/// The result of applying one append item: the row's allocated id, the
/// response `data` patch for the envelope, and the bus event to emit once
/// the enclosing transaction has committed.
pub struct AppendOutcome {
    pub append_id: String,
    pub append_type: AppendType,
    pub data: serde_json::Value,
    pub event_name: &'static str,
    pub event_data: serde_json::Value,
}

/// Validates the things that are cheap to check before any row exists:
/// type-appropriate `ref` presence, content size, and `expiresInSeconds`
/// against the configured claim bounds. Runs over every item in a batch
/// before a transaction opens, so a bad item anywhere in the batch fails
/// fast without allocating append ids for its neighbors.
pub fn preflight(item: &AppendItem, claim_settings: &ClaimSettings) -> Result<(), AppError> {
    let needs_ref = matches!(
        item.r#type,
        AppendType::Blocked | AppendType::Answer | AppendType::Vote | AppendType::Claim | AppendType::Response | AppendType::Cancel | AppendType::Renew
    );
    if needs_ref && item.r#ref.is_none() {
        return Err(AppError::new(
            ErrorCode::InvalidRequest,
            format!("{} requires `ref`", item.r#type),
        ));
    }

    if item.r#type == AppendType::Vote {
        match item.value.as_deref() {
            Some("+1") | Some("-1") => {}
            _ => {
                return Err(AppError::new(
                    ErrorCode::InvalidRequest,
                    "vote requires `value` of \"+1\" or \"-1\"",
                ))
            }
        }
    }

    if item.r#type == AppendType::Response && item.content.as_deref().unwrap_or("").is_empty() {
        return Err(AppError::new(ErrorCode::InvalidRequest, "response requires non-empty `content`"));
    }

    if let Some(content) = &item.content {
        if content.len() > APPEND_MAX_SIZE_BYTES {
            return Err(AppError::with_details(
                ErrorCode::PayloadTooLarge,
                "append content exceeds the size limit",
                json!({ "limit": APPEND_MAX_SIZE_BYTES }),
            ));
        }
    }

    if let Some(seconds) = item.expires_in_seconds {
        let bounds = claim_settings.min_expires_in_seconds..=claim_settings.max_expires_in_seconds;
        if !bounds.contains(&seconds) {
            return Err(AppError::new(
                ErrorCode::InvalidRequest,
                format!(
                    "expiresInSeconds must be within [{}, {}]",
                    claim_settings.min_expires_in_seconds, claim_settings.max_expires_in_seconds
                ),
            ));
        }
    }

    Ok(())
}

pub async fn handle(
    tx: &mut Transaction<'_, Sqlite>,
    ctx: &AppendContext<'_>,
    item: &AppendItem,
) -> Result<AppendOutcome, AppError> {
    match item.r#type {
        AppendType::Task => handle_task(tx, ctx, item).await,
        AppendType::Comment => handle_comment(tx, ctx, item).await,
        AppendType::Blocked => handle_blocked(tx, ctx, item).await,
        AppendType::Answer => handle_answer(tx, ctx, item).await,
        AppendType::Vote => handle_vote(tx, ctx, item).await,
        AppendType::Claim => handle_claim(tx, ctx, item).await,
        AppendType::Response => handle_response(tx, ctx, item).await,
        AppendType::Cancel => handle_cancel(tx, ctx, item).await,
        AppendType::Renew => handle_renew(tx, ctx, item).await,
    }
}

async fn next_id(tx: &mut Transaction<'_, Sqlite>, file_id: Uuid) -> Result<String, AppError> {
    let value = append_counters::next_value(&mut **tx, file_id).await?;
    Ok(format!("a{value}"))
}

fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

fn preview(content: &str) -> String {
    content.chars().take(CONTENT_PREVIEW_CHARS).collect()
}

fn base_data(append: &Append) -> serde_json::Value {
    json!({
        "id": append.append_id,
        "type": append.r#type.to_string(),
        "author": append.author,
        "ts": append.created_at,
    })
}

async fn handle_task(
    tx: &mut Transaction<'_, Sqlite>,
    ctx: &AppendContext<'_>,
    item: &AppendItem,
) -> Result<AppendOutcome, AppError> {
    let append_id = next_id(tx, ctx.file.id).await?;
    let hash = item.content.as_deref().map(content_hash);
    let prev = item.content.as_deref().map(preview);

    let row = appends::insert(
        &mut **tx,
        ctx.file.id,
        appends::NewAppend {
            append_id,
            author: ctx.author,
            r#type: AppendType::Task,
            r#ref: None,
            status: Some(append::OPEN),
            priority: item.priority.as_deref(),
            labels: item.labels.as_deref(),
            due_at: item.due_at,
            expires_at: None,
            value: None,
            content: item.content.as_deref(),
            content_preview: prev.as_deref(),
            content_hash: hash.as_deref(),
        },
        ctx.now,
    )
    .await?;

    let mut data = base_data(&row);
    data["status"] = json!(append::OPEN);
    if let Some(priority) = &item.priority {
        data["priority"] = json!(priority);
    }
    if let Some(labels) = &item.labels {
        data["labels"] = json!(labels);
    }
    if let Some(due_at) = item.due_at {
        data["dueAt"] = json!(due_at);
    }

    let event_data = json!({ "appendId": row.append_id, "author": row.author });
    Ok(AppendOutcome {
        append_id: row.append_id,
        append_type: AppendType::Task,
        data,
        event_name: "task.created",
        event_data,
    })
}

async fn handle_comment(
    tx: &mut Transaction<'_, Sqlite>,
    ctx: &AppendContext<'_>,
    item: &AppendItem,
) -> Result<AppendOutcome, AppError> {
    let append_id = next_id(tx, ctx.file.id).await?;
    let hash = item.content.as_deref().map(content_hash);
    let prev = item.content.as_deref().map(preview);

    let row = appends::insert(
        &mut **tx,
        ctx.file.id,
        appends::NewAppend {
            append_id,
            author: ctx.author,
            r#type: AppendType::Comment,
            r#ref: item.r#ref.as_deref(),
            status: None,
            priority: None,
            labels: None,
            due_at: None,
            expires_at: None,
            value: None,
            content: item.content.as_deref(),
            content_preview: prev.as_deref(),
            content_hash: hash.as_deref(),
        },
        ctx.now,
    )
    .await?;

    let data = base_data(&row);
    let event_data = json!({ "appendId": row.append_id, "author": row.author, "ref": row.r#ref });
    Ok(AppendOutcome { append_id: row.append_id.clone(), append_type: AppendType::Comment, data, event_name: "append", event_data })
}

async fn handle_blocked(
    tx: &mut Transaction<'_, Sqlite>,
    ctx: &AppendContext<'_>,
    item: &AppendItem,
) -> Result<AppendOutcome, AppError> {
    let r#ref = item.r#ref.as_deref().expect("checked in preflight");
    let append_id = next_id(tx, ctx.file.id).await?;
    let hash = item.content.as_deref().map(content_hash);
    let prev = item.content.as_deref().map(preview);

    let row = appends::insert(
        &mut **tx,
        ctx.file.id,
        appends::NewAppend {
            append_id,
            author: ctx.author,
            r#type: AppendType::Blocked,
            r#ref: Some(r#ref),
            status: Some(append::ACTIVE),
            priority: None,
            labels: None,
            due_at: None,
            expires_at: None,
            value: None,
            content: item.content.as_deref(),
            content_preview: prev.as_deref(),
            content_hash: hash.as_deref(),
        },
        ctx.now,
    )
    .await?;

    let mut data = base_data(&row);
    data["ref"] = json!(r#ref);
    data["status"] = json!(append::ACTIVE);

    let event_data = json!({ "appendId": row.append_id, "author": row.author, "ref": r#ref });
    Ok(AppendOutcome { append_id: row.append_id.clone(), append_type: AppendType::Blocked, data, event_name: "task.blocked", event_data })
}

async fn handle_answer(
    tx: &mut Transaction<'_, Sqlite>,
    ctx: &AppendContext<'_>,
    item: &AppendItem,
) -> Result<AppendOutcome, AppError> {
    let r#ref = item.r#ref.as_deref().expect("checked in preflight");

    let referenced = appends::fetch_by_append_id(&mut **tx, ctx.file.id, r#ref)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::AppendNotFound, "referenced append does not exist"))?;

    if referenced.r#type != AppendType::Blocked {
        return Err(AppError::new(ErrorCode::InvalidRef, "answer must reference a blocked append"));
    }

    let append_id = next_id(tx, ctx.file.id).await?;
    let hash = item.content.as_deref().map(content_hash);
    let prev = item.content.as_deref().map(preview);

    let row = appends::insert(
        &mut **tx,
        ctx.file.id,
        appends::NewAppend {
            append_id,
            author: ctx.author,
            r#type: AppendType::Answer,
            r#ref: Some(r#ref),
            status: None,
            priority: None,
            labels: None,
            due_at: None,
            expires_at: None,
            value: None,
            content: item.content.as_deref(),
            content_preview: prev.as_deref(),
            content_hash: hash.as_deref(),
        },
        ctx.now,
    )
    .await?;

    let mut data = base_data(&row);
    data["ref"] = json!(r#ref);

    let event_data = json!({ "appendId": row.append_id, "author": row.author, "ref": r#ref });
    Ok(AppendOutcome { append_id: row.append_id.clone(), append_type: AppendType::Answer, data, event_name: "append", event_data })
}

async fn handle_vote(
    tx: &mut Transaction<'_, Sqlite>,
    ctx: &AppendContext<'_>,
    item: &AppendItem,
) -> Result<AppendOutcome, AppError> {
    let r#ref = item.r#ref.as_deref().expect("checked in preflight");
    let value = item.value.as_deref().expect("checked in preflight");
    let append_id = next_id(tx, ctx.file.id).await?;

    let row = appends::insert(
        &mut **tx,
        ctx.file.id,
        appends::NewAppend {
            append_id,
            author: ctx.author,
            r#type: AppendType::Vote,
            r#ref: Some(r#ref),
            status: None,
            priority: None,
            labels: None,
            due_at: None,
            expires_at: None,
            value: Some(value),
            content: None,
            content_preview: None,
            content_hash: None,
        },
        ctx.now,
    )
    .await?;

    let mut data = base_data(&row);
    data["ref"] = json!(r#ref);
    data["value"] = json!(value);

    let event_data = json!({ "appendId": row.append_id, "author": row.author, "ref": r#ref, "value": value });
    Ok(AppendOutcome { append_id: row.append_id.clone(), append_type: AppendType::Vote, data, event_name: "append", event_data })
}

/// The claim protocol (see module docs on the caller side for the
/// transaction-isolation requirement). Must run inside a write transaction
/// opened with `BEGIN IMMEDIATE` so the active-claim check and the insert it
/// gates are evaluated under the same lock.
async fn handle_claim(
    tx: &mut Transaction<'_, Sqlite>,
    ctx: &AppendContext<'_>,
    item: &AppendItem,
) -> Result<AppendOutcome, AppError> {
    let r#ref = item.r#ref.as_deref().expect("checked in preflight");

    let task = appends::fetch_by_append_id(&mut **tx, ctx.file.id, r#ref)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::AppendNotFound, "referenced task does not exist"))?;

    if task.r#type != AppendType::Task {
        return Err(AppError::new(ErrorCode::InvalidRef, "claim must reference a task"));
    }

    if task.status.as_deref() == Some(append::DONE) {
        return Err(AppError::new(ErrorCode::TaskAlreadyComplete, "task is already complete"));
    }

    let expires_in = item
        .expires_in_seconds
        .unwrap_or(ctx.claim_settings.default_expires_in_seconds);

    let active_claim = appends::fetch_active_claim(&mut **tx, ctx.file.id, r#ref).await?;
    let active_claim = active_claim.filter(|c| c.expires_at.is_some_and(|e| e > ctx.now));

    if let Some(existing) = active_claim {
        if existing.author == ctx.author {
            let renewed_expiry = (ctx.now + ChronoDuration::seconds(expires_in))
                .max(existing.expires_at.expect("active claim has expiresAt") + ChronoDuration::milliseconds(1));

            appends::update_claim_status(&mut **tx, existing.id, append::ACTIVE, Some(renewed_expiry)).await?;

            let mut data = base_data(&existing);
            data["ref"] = json!(r#ref);
            data["expiresAt"] = json!(renewed_expiry);
            data["expiresInSeconds"] = json!(expires_in);

            let event_data = json!({ "appendId": existing.append_id, "author": ctx.author, "ref": r#ref, "expiresAt": renewed_expiry });
            return Ok(AppendOutcome {
                append_id: existing.append_id.clone(),
                append_type: AppendType::Claim,
                data,
                event_name: "claim.renewed",
                event_data,
            });
        }

        let retry_after_ms = (existing.expires_at.unwrap() - ctx.now).num_milliseconds().max(0);
        return Err(AppError::with_details(
            ErrorCode::AlreadyClaimed,
            "task is already claimed by another agent",
            json!({
                "claimedBy": existing.author,
                "expiresAt": existing.expires_at,
                "retryAfterMs": retry_after_ms,
            }),
        ));
    }

    let append_id = next_id(tx, ctx.file.id).await?;
    let expires_at = ctx.now + ChronoDuration::seconds(expires_in);

    let row = appends::insert(
        &mut **tx,
        ctx.file.id,
        appends::NewAppend {
            append_id,
            author: ctx.author,
            r#type: AppendType::Claim,
            r#ref: Some(r#ref),
            status: Some(append::ACTIVE),
            priority: None,
            labels: None,
            due_at: None,
            expires_at: Some(expires_at),
            value: None,
            content: None,
            content_preview: None,
            content_hash: None,
        },
        ctx.now,
    )
    .await?;

    let mut data = base_data(&row);
    data["ref"] = json!(r#ref);
    data["expiresAt"] = json!(expires_at);
    data["expiresInSeconds"] = json!(expires_in);

    let event_data = json!({ "appendId": row.append_id, "author": row.author, "ref": r#ref, "expiresAt": expires_at });
    Ok(AppendOutcome { append_id: row.append_id.clone(), append_type: AppendType::Claim, data, event_name: "claim.created", event_data })
}

/// Permissive by design: a response is accepted even if its author doesn't
/// hold the active claim on the referenced task (see the response
/// authorization note). It still performs the claim-completion and
/// task-completion side effects unconditionally when the referents exist.
async fn handle_response(
    tx: &mut Transaction<'_, Sqlite>,
    ctx: &AppendContext<'_>,
    item: &AppendItem,
) -> Result<AppendOutcome, AppError> {
    let r#ref = item.r#ref.as_deref().expect("checked in preflight");
    let content = item.content.as_deref().expect("checked in preflight");

    if let Some(claim) = appends::fetch_active_claim(&mut **tx, ctx.file.id, r#ref).await? {
        appends::update_claim_status(&mut **tx, claim.id, append::COMPLETED, claim.expires_at).await?;
    }

    if let Some(task) = appends::fetch_task(&mut **tx, ctx.file.id, r#ref).await? {
        sqlx::query("UPDATE appends SET status = ? WHERE id = ?")
            .bind(append::DONE)
            .bind(task.id.to_string())
            .execute(&mut **tx)
            .await?;
    }

    let append_id = next_id(tx, ctx.file.id).await?;
    let hash = content_hash(content);
    let prev = preview(content);

    let row = appends::insert(
        &mut **tx,
        ctx.file.id,
        appends::NewAppend {
            append_id,
            author: ctx.author,
            r#type: AppendType::Response,
            r#ref: Some(r#ref),
            status: None,
            priority: None,
            labels: None,
            due_at: None,
            expires_at: None,
            value: None,
            content: Some(content),
            content_preview: Some(&prev),
            content_hash: Some(&hash),
        },
        ctx.now,
    )
    .await?;

    let mut data = base_data(&row);
    data["ref"] = json!(r#ref);
    data["taskStatus"] = json!(append::DONE);

    let event_data = json!({ "appendId": row.append_id, "author": row.author, "ref": r#ref });
    Ok(AppendOutcome { append_id: row.append_id.clone(), append_type: AppendType::Response, data, event_name: "task.completed", event_data })
}

async fn handle_cancel(
    tx: &mut Transaction<'_, Sqlite>,
    ctx: &AppendContext<'_>,
    item: &AppendItem,
) -> Result<AppendOutcome, AppError> {
    let r#ref = item.r#ref.as_deref().expect("checked in preflight");

    let claim = appends::fetch_by_append_id(&mut **tx, ctx.file.id, r#ref)
        .await?
        .filter(|a| a.r#type == AppendType::Claim)
        .ok_or_else(|| AppError::new(ErrorCode::AppendNotFound, "referenced claim does not exist"))?;

    if claim.author != ctx.author {
        return Err(AppError::new(ErrorCode::CannotCancelOthersClaim, "only the claim holder may cancel it"));
    }

    appends::update_claim_status(&mut **tx, claim.id, append::CANCELLED, claim.expires_at).await?;

    if let Some(task_ref) = &claim.r#ref {
        if let Some(task) = appends::fetch_task(&mut **tx, ctx.file.id, task_ref).await? {
            sqlx::query("UPDATE appends SET status = ? WHERE id = ?")
                .bind(append::OPEN)
                .bind(task.id.to_string())
                .execute(&mut **tx)
                .await?;
        }
    }

    let append_id = next_id(tx, ctx.file.id).await?;
    let row = appends::insert(
        &mut **tx,
        ctx.file.id,
        appends::NewAppend {
            append_id,
            author: ctx.author,
            r#type: AppendType::Cancel,
            r#ref: Some(r#ref),
            status: None,
            priority: None,
            labels: None,
            due_at: None,
            expires_at: None,
            value: None,
            content: None,
            content_preview: None,
            content_hash: None,
        },
        ctx.now,
    )
    .await?;

    let mut data = base_data(&row);
    data["ref"] = json!(r#ref);
    data["taskStatus"] = json!(append::OPEN);

    let event_data = json!({ "appendId": row.append_id, "author": row.author, "ref": r#ref });
    Ok(AppendOutcome { append_id: row.append_id.clone(), append_type: AppendType::Cancel, data, event_name: "claim.released", event_data })
}

async fn handle_renew(
    tx: &mut Transaction<'_, Sqlite>,
    ctx: &AppendContext<'_>,
    item: &AppendItem,
) -> Result<AppendOutcome, AppError> {
    let r#ref = item.r#ref.as_deref().expect("checked in preflight");

    let claim = appends::fetch_by_append_id(&mut **tx, ctx.file.id, r#ref)
        .await?
        .filter(|a| a.r#type == AppendType::Claim)
        .ok_or_else(|| AppError::new(ErrorCode::AppendNotFound, "referenced claim does not exist"))?;

    if claim.author != ctx.author {
        return Err(AppError::new(ErrorCode::CannotRenewOthersClaim, "only the claim holder may renew it"));
    }

    let expires_in = item
        .expires_in_seconds
        .unwrap_or(ctx.claim_settings.default_expires_in_seconds);

    let current_expiry = claim.expires_at.unwrap_or(ctx.now);
    let new_expiry = (ctx.now + ChronoDuration::seconds(expires_in))
        .max(current_expiry + ChronoDuration::milliseconds(1));

    appends::update_claim_status(&mut **tx, claim.id, append::ACTIVE, Some(new_expiry)).await?;

    let append_id = next_id(tx, ctx.file.id).await?;
    let row = appends::insert(
        &mut **tx,
        ctx.file.id,
        appends::NewAppend {
            append_id,
            author: ctx.author,
            r#type: AppendType::Renew,
            r#ref: Some(r#ref),
            status: None,
            priority: None,
            labels: None,
            due_at: None,
            expires_at: Some(new_expiry),
            value: None,
            content: None,
            content_preview: None,
            content_hash: None,
        },
        ctx.now,
    )
    .await?;

    let mut data = base_data(&row);
    data["ref"] = json!(r#ref);
    data["expiresAt"] = json!(new_expiry);
    data["expiresInSeconds"] = json!(expires_in);

    let event_data = json!({ "appendId": row.append_id, "author": row.author, "ref": r#ref, "expiresAt": new_expiry });
    Ok(AppendOutcome { append_id: row.append_id.clone(), append_type: AppendType::Renew, data, event_name: "claim.renewed", event_data })
}
