use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// A client-supplied idempotency token's state. `response_status` of `0`
/// means the owner is still computing the result; any other value means the
/// row is finalized and `response_body` holds the envelope to replay.
#[derive(Debug, Clone, FromRow)]
pub struct IdempotencyRecord {
    pub key: String,
    pub capability_key_id: Uuid,
    pub response_status: i64,
    pub response_body: String,
    pub created_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    pub fn is_pending(&self) -> bool {
        self.response_status == 0
    }
}
