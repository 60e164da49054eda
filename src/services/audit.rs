use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::repo::audit::{self, NewAuditEvent};

/// Records a fire-and-forget audit entry. Failures are logged, never
/// surfaced to the caller — an audit write must not be able to fail a
/// request that otherwise succeeded.
pub async fn record(
    db: &SqlitePool,
    workspace_id: Uuid,
    action: &str,
    resource_type: &str,
    resource_id: &str,
    actor: &str,
    metadata: Option<serde_json::Value>,
    now: DateTime<Utc>,
) {
    let event = NewAuditEvent {
        workspace_id,
        action,
        resource_type,
        resource_id,
        actor,
        actor_type: "agent",
        metadata,
    };

    if let Err(err) = audit::insert(db, event, now).await {
        tracing::error!(?err, action, "failed to write audit record");
    }
}
