use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The closed set of append types the state machine understands. The
/// request schema (see `controllers::append`) rejects anything outside this
/// set before it ever reaches a handler, so the dispatch in
/// `services::append_machine::handle` is an exhaustive match with no
/// catch-all arm.
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize, sqlx::Type, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AppendType {
    Task,
    Claim,
    Response,
    Cancel,
    Renew,
    Comment,
    Blocked,
    Answer,
    Vote,
}

/// A row in a file's append log. Most fields are write-once; `status` and
/// `expires_at` are the only columns ever mutated after insertion, and only
/// by the narrow transitions the state machine defines (claim renew/cancel,
/// task completion).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Append {
    pub id: Uuid,
    pub file_id: Uuid,
    pub append_id: String,
    pub author: String,
    #[sqlx(rename = "type")]
    pub r#type: AppendType,
    #[sqlx(rename = "ref")]
    pub r#ref: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub labels: Option<sqlx::types::Json<Vec<String>>>,
    pub due_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub value: Option<String>,
    pub content: Option<String>,
    pub content_preview: Option<String>,
    pub created_at: DateTime<Utc>,
    pub content_hash: Option<String>,
}

impl Append {
    pub fn is_active_claim(&self, now: DateTime<Utc>) -> bool {
        self.r#type == AppendType::Claim
            && self.status.as_deref() == Some("active")
            && self.expires_at.is_some_and(|e| e > now)
    }
}

/// The per-file monotonic counter backing append-id allocation.
#[derive(Debug, Clone, FromRow)]
pub struct AppendCounter {
    pub file_id: Uuid,
    pub next_value: i64,
}

/// Per-append content size limit (UTF-8 octet length), echoed in the
/// `Content-Size-Limit` header on a `PAYLOAD_TOO_LARGE` rejection.
pub const APPEND_MAX_SIZE_BYTES: usize = 64 * 1024;

pub const ACTIVE: &str = "active";
pub const COMPLETED: &str = "completed";
pub const CANCELLED: &str = "cancelled";
pub const OPEN: &str = "open";
pub const DONE: &str = "done";
