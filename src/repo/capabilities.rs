use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::capability::CapabilityKey;

pub async fn fetch_by_hash(
    db: &SqlitePool,
    salted_hash: &str,
) -> Result<Option<CapabilityKey>, sqlx::Error> {
    sqlx::query_as::<_, CapabilityKey>(
        "SELECT id, workspace_id, salted_hash, permission, scope_type, scope_path,
                bound_author, allowed_types, wip_limit, expires_at, revoked_at
         FROM capability_keys WHERE salted_hash = ?",
    )
    .bind(salted_hash)
    .fetch_optional(db)
    .await
}

pub async fn fetch_one(db: &SqlitePool, id: Uuid) -> Result<Option<CapabilityKey>, sqlx::Error> {
    sqlx::query_as::<_, CapabilityKey>(
        "SELECT id, workspace_id, salted_hash, permission, scope_type, scope_path,
                bound_author, allowed_types, wip_limit, expires_at, revoked_at
         FROM capability_keys WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_optional(db)
    .await
}

#[allow(clippy::too_many_arguments)]
pub async fn insert(
    db: &SqlitePool,
    workspace_id: Uuid,
    salted_hash: &str,
    permission: crate::models::capability::Permission,
    scope_type: crate::models::capability::ScopeType,
    scope_path: Option<&str>,
    bound_author: Option<&str>,
    allowed_types: Option<&[crate::models::append::AppendType]>,
    wip_limit: Option<i64>,
    expires_at: Option<chrono::DateTime<chrono::Utc>>,
) -> Result<CapabilityKey, sqlx::Error> {
    let id = Uuid::new_v4();
    let allowed_types_json = allowed_types.map(sqlx::types::Json);

    sqlx::query(
        "INSERT INTO capability_keys
            (id, workspace_id, salted_hash, permission, scope_type, scope_path,
             bound_author, allowed_types, wip_limit, expires_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(workspace_id.to_string())
    .bind(salted_hash)
    .bind(permission)
    .bind(scope_type)
    .bind(scope_path)
    .bind(bound_author)
    .bind(allowed_types_json)
    .bind(wip_limit)
    .bind(expires_at)
    .execute(db)
    .await?;

    Ok(fetch_one(db, id).await?.expect("just inserted"))
}

pub async fn revoke(db: &SqlitePool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE capability_keys SET revoked_at = ? WHERE id = ? AND revoked_at IS NULL")
        .bind(chrono::Utc::now())
        .bind(id.to_string())
        .execute(db)
        .await?;
    Ok(())
}
