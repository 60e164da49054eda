use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Tenant root. Every file, capability key, and append belongs to exactly
/// one workspace; nothing in the core crosses this boundary.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Workspace {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}
