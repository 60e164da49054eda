use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::append::AppendType;

/// Permission tiers, ordered loosely weakest-to-strongest. `read` admits all
/// tiers below it in the authorization check; `append` admits itself and
/// `write`; `write` admits only `write`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Permission {
    Read,
    Append,
    Write,
}

impl Permission {
    /// Whether a key issued with `self` satisfies a request that requires
    /// `required`.
    pub fn satisfies(&self, required: Permission) -> bool {
        match (self, required) {
            (_, Permission::Read) => true,
            (Permission::Append | Permission::Write, Permission::Append) => true,
            (Permission::Write, Permission::Write) => true,
            _ => false,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ScopeType {
    Workspace,
    Folder,
    File,
}

/// An issued capability URL's authorization record. The plaintext key is
/// never persisted; `salted_hash` is the lookup key.
#[derive(Debug, Clone, FromRow)]
pub struct CapabilityKey {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub salted_hash: String,
    pub permission: Permission,
    pub scope_type: ScopeType,
    pub scope_path: Option<String>,
    pub bound_author: Option<String>,
    pub allowed_types: Option<sqlx::types::Json<Vec<AppendType>>>,
    pub wip_limit: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl CapabilityKey {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|e| e <= now)
    }

    pub fn allows_type(&self, t: AppendType) -> bool {
        match &self.allowed_types {
            None => true,
            Some(types) => types.0.contains(&t),
        }
    }

    pub fn allows_author(&self, author: &str) -> bool {
        match &self.bound_author {
            None => true,
            Some(bound) => bound == author,
        }
    }
}

/// Minimum length of a well-formed plaintext capability key string, and the
/// alphabet it is drawn from (URL-safe base64 without padding).
pub const MIN_KEY_LENGTH: usize = 22;

pub fn is_well_formed_key(key: &str) -> bool {
    key.len() >= MIN_KEY_LENGTH
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
