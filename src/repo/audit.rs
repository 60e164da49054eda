use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

pub struct NewAuditEvent<'a> {
    pub workspace_id: Uuid,
    pub action: &'a str,
    pub resource_type: &'a str,
    pub resource_id: &'a str,
    pub actor: &'a str,
    pub actor_type: &'a str,
    pub metadata: Option<serde_json::Value>,
}

pub async fn insert(db: &SqlitePool, event: NewAuditEvent<'_>, now: DateTime<Utc>) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO audit_log
            (id, workspace_id, action, resource_type, resource_id, actor, actor_type, metadata, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(event.workspace_id.to_string())
    .bind(event.action)
    .bind(event.resource_type)
    .bind(event.resource_id)
    .bind(event.actor)
    .bind(event.actor_type)
    .bind(event.metadata.map(|m| m.to_string()))
    .bind(now)
    .execute(db)
    .await?;
    Ok(())
}
