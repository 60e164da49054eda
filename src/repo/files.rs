use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::file::File;

pub async fn fetch_by_path(
    db: &SqlitePool,
    workspace_id: Uuid,
    path: &str,
) -> Result<Option<File>, sqlx::Error> {
    sqlx::query_as::<_, File>(
        "SELECT id, workspace_id, path, content, created_at, updated_at, deleted_at
         FROM files WHERE workspace_id = ? AND path = ? AND deleted_at IS NULL",
    )
    .bind(workspace_id.to_string())
    .bind(path)
    .fetch_optional(db)
    .await
}

/// Like `fetch_by_path`, but also returns a soft-deleted row. Callers that
/// need to distinguish "never existed" (404) from "existed but was deleted"
/// (410) must use this instead of `fetch_by_path`, which filters deleted
/// rows out entirely and makes the two cases indistinguishable.
pub async fn fetch_by_path_including_deleted(
    db: &SqlitePool,
    workspace_id: Uuid,
    path: &str,
) -> Result<Option<File>, sqlx::Error> {
    sqlx::query_as::<_, File>(
        "SELECT id, workspace_id, path, content, created_at, updated_at, deleted_at
         FROM files WHERE workspace_id = ? AND path = ?
         ORDER BY created_at DESC LIMIT 1",
    )
    .bind(workspace_id.to_string())
    .bind(path)
    .fetch_optional(db)
    .await
}

pub async fn fetch_one(db: &SqlitePool, id: Uuid) -> Result<Option<File>, sqlx::Error> {
    sqlx::query_as::<_, File>(
        "SELECT id, workspace_id, path, content, created_at, updated_at, deleted_at
         FROM files WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_optional(db)
    .await
}

/// Creates the file if it doesn't already exist (used by test fixtures and
/// the out-of-core PUT lifecycle endpoint). Returns the existing row if one
/// is already live at this path.
pub async fn get_or_create(
    db: &SqlitePool,
    workspace_id: Uuid,
    path: &str,
) -> Result<File, sqlx::Error> {
    if let Some(file) = fetch_by_path(db, workspace_id, path).await? {
        return Ok(file);
    }

    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        "INSERT INTO files (id, workspace_id, path, content, created_at, updated_at)
         VALUES (?, ?, ?, '', ?, ?)",
    )
    .bind(id.to_string())
    .bind(workspace_id.to_string())
    .bind(path)
    .bind(now)
    .bind(now)
    .execute(db)
    .await?;

    fetch_one(db, id).await.map(|f| f.expect("just inserted"))
}

pub async fn set_content(
    db: &SqlitePool,
    id: Uuid,
    content: &str,
    now: chrono::DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE files SET content = ?, updated_at = ? WHERE id = ?")
        .bind(content)
        .bind(now)
        .bind(id.to_string())
        .execute(db)
        .await?;
    Ok(())
}

pub async fn soft_delete(db: &SqlitePool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE files SET deleted_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(db)
        .await?;
    Ok(())
}
