use chrono::{DateTime, Utc};
use sqlx::Sqlite;
use uuid::Uuid;

use crate::models::append::{Append, AppendType};

pub async fn fetch_by_append_id<'e, E>(
    executor: E,
    file_id: Uuid,
    append_id: &str,
) -> Result<Option<Append>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Append>(
        "SELECT id, file_id, append_id, author, type, ref, status, priority, labels,
                due_at, expires_at, value, content, content_preview, created_at, content_hash
         FROM appends WHERE file_id = ? AND append_id = ?",
    )
    .bind(file_id.to_string())
    .bind(append_id)
    .fetch_optional(executor)
    .await
}

pub async fn fetch_by_ref<'e, E>(
    executor: E,
    file_id: Uuid,
    r#ref: &str,
) -> Result<Vec<Append>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Append>(
        "SELECT id, file_id, append_id, author, type, ref, status, priority, labels,
                due_at, expires_at, value, content, content_preview, created_at, content_hash
         FROM appends WHERE file_id = ? AND ref = ?
         ORDER BY append_id",
    )
    .bind(file_id.to_string())
    .bind(r#ref)
    .fetch_all(executor)
    .await
}

/// The currently active (unexpired, unreleased) claim against a task, if
/// any. Callers still must compare `expires_at` against the request's clock
/// rather than trusting `status` alone, since expiry is lazy: nothing writes
/// `status = "cancelled"` purely because time passed.
pub async fn fetch_active_claim<'e, E>(
    executor: E,
    file_id: Uuid,
    r#ref: &str,
) -> Result<Option<Append>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Append>(
        "SELECT id, file_id, append_id, author, type, ref, status, priority, labels,
                due_at, expires_at, value, content, content_preview, created_at, content_hash
         FROM appends
         WHERE file_id = ? AND ref = ? AND type = 'claim' AND status = 'active'
         ORDER BY append_id DESC LIMIT 1",
    )
    .bind(file_id.to_string())
    .bind(r#ref)
    .fetch_optional(executor)
    .await
}

pub async fn fetch_task<'e, E>(
    executor: E,
    file_id: Uuid,
    task_append_id: &str,
) -> Result<Option<Append>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Append>(
        "SELECT id, file_id, append_id, author, type, ref, status, priority, labels,
                due_at, expires_at, value, content, content_preview, created_at, content_hash
         FROM appends WHERE file_id = ? AND append_id = ? AND type = 'task'",
    )
    .bind(file_id.to_string())
    .bind(task_append_id)
    .fetch_optional(executor)
    .await
}

/// How many active, unexpired claims `author` currently holds across the
/// whole workspace. Used to enforce a key's `wip_limit`. This check and the
/// insert it gates are not atomic with respect to other connections racing
/// on the *same* author across *different* files; the per-ref claim
/// exclusivity is what `BEGIN IMMEDIATE` actually guarantees.
pub async fn count_active_claims_for_author_in_workspace<'e, E>(
    executor: E,
    workspace_id: Uuid,
    author: &str,
    now: DateTime<Utc>,
) -> Result<i64, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM appends a
         JOIN files f ON f.id = a.file_id
         WHERE f.workspace_id = ? AND a.author = ? AND a.type = 'claim'
           AND a.status = 'active' AND a.expires_at > ?",
    )
    .bind(workspace_id.to_string())
    .bind(author)
    .bind(now)
    .fetch_one(executor)
    .await?;

    Ok(row.0)
}

#[derive(Debug, Clone)]
pub struct NewAppend<'a> {
    pub append_id: String,
    pub author: &'a str,
    pub r#type: AppendType,
    pub r#ref: Option<&'a str>,
    pub status: Option<&'a str>,
    pub priority: Option<&'a str>,
    pub labels: Option<&'a [String]>,
    pub due_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub value: Option<&'a str>,
    pub content: Option<&'a str>,
    pub content_preview: Option<&'a str>,
    pub content_hash: Option<&'a str>,
}

pub async fn insert<'e, E>(
    executor: E,
    file_id: Uuid,
    new: NewAppend<'_>,
    now: DateTime<Utc>,
) -> Result<Append, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let id = Uuid::new_v4();
    let labels_json = new.labels.map(|l| sqlx::types::Json(l.to_vec()));

    sqlx::query(
        "INSERT INTO appends
            (id, file_id, append_id, author, type, ref, status, priority, labels,
             due_at, expires_at, value, content, content_preview, created_at, content_hash)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(file_id.to_string())
    .bind(&new.append_id)
    .bind(new.author)
    .bind(new.r#type)
    .bind(new.r#ref)
    .bind(new.status)
    .bind(new.priority)
    .bind(labels_json)
    .bind(new.due_at)
    .bind(new.expires_at)
    .bind(new.value)
    .bind(new.content)
    .bind(new.content_preview)
    .bind(now)
    .bind(new.content_hash)
    .execute(executor)
    .await?;

    Ok(Append {
        id,
        file_id,
        append_id: new.append_id,
        author: new.author.to_string(),
        r#type: new.r#type,
        r#ref: new.r#ref.map(String::from),
        status: new.status.map(String::from),
        priority: new.priority.map(String::from),
        labels: new.labels.map(|l| sqlx::types::Json(l.to_vec())),
        due_at: new.due_at,
        expires_at: new.expires_at,
        value: new.value.map(String::from),
        content: new.content.map(String::from),
        content_preview: new.content_preview.map(String::from),
        created_at: now,
        content_hash: new.content_hash.map(String::from),
    })
}

/// Updates a claim's `status` and (optionally) `expires_at` — the only
/// mutation path the append log allows. Used by cancel, renew, and the
/// implicit claim-completion that response/cancel trigger.
pub async fn update_claim_status<'e, E>(
    executor: E,
    append_id: Uuid,
    status: &str,
    expires_at: Option<DateTime<Utc>>,
) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query("UPDATE appends SET status = ?, expires_at = ? WHERE id = ?")
        .bind(status)
        .bind(expires_at)
        .bind(append_id.to_string())
        .execute(executor)
        .await?;
    Ok(())
}
