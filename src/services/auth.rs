use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use sqlx::SqlitePool;

use crate::error::{AppError, ErrorCode};
use crate::models::append::AppendType;
use crate::models::capability::{is_well_formed_key, CapabilityKey, Permission, ScopeType};
use crate::repo::capabilities;
use crate::services::path;

type HmacSha256 = Hmac<Sha256>;

/// Salts a plaintext capability key with the server-wide pepper before it
/// ever touches the database or a log line. The pepper is configuration,
/// not a per-key secret, so rotating it invalidates every issued key at
/// once — see `ApplicationSettings::key_pepper`.
pub fn hash_key(raw_key: &str, pepper: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(pepper.as_bytes()).expect("HMAC accepts any key length");
    mac.update(raw_key.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// What a request asks of its capability key, gathered before the lookup so
/// the full ordered contract in `authorize` can be checked in one pass.
pub struct AuthRequest<'a> {
    pub required: Permission,
    pub request_path: &'a str,
    pub author: Option<&'a str>,
    pub types: &'a [AppendType],
}

pub async fn authorize(
    db: &SqlitePool,
    raw_key: &str,
    pepper: &str,
    req: AuthRequest<'_>,
    now: DateTime<Utc>,
) -> Result<CapabilityKey, AppError> {
    if !is_well_formed_key(raw_key) {
        return Err(AppError::new(ErrorCode::InvalidKey, "malformed capability key"));
    }

    let salted_hash = hash_key(raw_key, pepper);
    let key = capabilities::fetch_by_hash(db, &salted_hash)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::InvalidKey, "unknown capability key"))?;

    let scope_ok = match key.scope_type {
        ScopeType::Workspace => true,
        ScopeType::Folder | ScopeType::File => {
            key.scope_path.as_deref().is_some_and(|p| !p.is_empty())
        }
    };
    if !scope_ok {
        return Err(AppError::new(ErrorCode::InvalidKey, "key has an invalid scope binding"));
    }

    if key.is_revoked() {
        return Err(AppError::new(ErrorCode::KeyRevoked, "capability key has been revoked"));
    }

    if key.is_expired(now) {
        return Err(AppError::new(ErrorCode::KeyExpired, "capability key has expired"));
    }

    if !key.permission.satisfies(req.required) {
        return Err(AppError::new(
            ErrorCode::PermissionDenied,
            "capability key does not grant the required permission tier",
        ));
    }

    let path_ok = match key.scope_type {
        ScopeType::Workspace => true,
        ScopeType::File => key.scope_path.as_deref() == Some(req.request_path),
        ScopeType::Folder => key
            .scope_path
            .as_deref()
            .is_some_and(|scope| path::is_descendant_or_equal(scope, req.request_path)),
    };
    if !path_ok {
        return Err(AppError::new(
            ErrorCode::PermissionDenied,
            "capability key scope does not cover this path",
        ));
    }

    if let Some(author) = req.author {
        if !key.allows_author(author) {
            return Err(AppError::new(
                ErrorCode::AuthorMismatch,
                "author does not match the key's bound author",
            ));
        }
    }

    for t in req.types {
        if !key.allows_type(*t) {
            return Err(AppError::with_details(
                ErrorCode::TypeNotAllowed,
                "append type is not allowed by this capability key",
                serde_json::json!({ "type": t.to_string() }),
            ));
        }
    }

    Ok(key)
}
