use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::workspace::Workspace;

pub async fn insert(db: &SqlitePool, name: &str) -> Result<Workspace, sqlx::Error> {
    let id = Uuid::new_v4();
    let now = chrono::Utc::now();

    sqlx::query("INSERT INTO workspaces (id, name, created_at) VALUES (?, ?, ?)")
        .bind(id.to_string())
        .bind(name)
        .bind(now)
        .execute(db)
        .await?;

    fetch_one(db, id).await
}

pub async fn fetch_one(db: &SqlitePool, id: Uuid) -> Result<Workspace, sqlx::Error> {
    sqlx::query_as::<_, Workspace>(
        "SELECT id, name, created_at, deleted_at FROM workspaces WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_one(db)
    .await
}
