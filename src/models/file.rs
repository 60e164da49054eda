use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// A stored markdown file. At most one non-deleted row may exist per
/// `(workspace_id, path)`; soft-deleted files are tombstoned for a retention
/// window rather than removed immediately.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct File {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub path: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl File {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Soft-deleted files are retained for this long before they could be
/// purged by an out-of-band sweep; the core never performs the purge.
pub const TOMBSTONE_RETENTION_DAYS: i64 = 7;
