use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::context::AppContext;
use crate::error::{AppError, ErrorCode};
use crate::models::capability::Permission;
use crate::repo::files;
use crate::services::{auth, path as path_svc};

#[derive(Debug, Deserialize)]
pub struct PutFileBody {
    #[serde(default)]
    content: String,
}

/// `PUT /w/:key/*path` — file lifecycle endpoint, outside the append
/// subsystem's core but needed to stand up fixtures for it.
pub async fn put(
    State(ctx): State<AppContext>,
    Path((key, raw_path)): Path<(String, String)>,
    Json(body): Json<PutFileBody>,
) -> Result<impl IntoResponse, AppError> {
    let now = ctx.clock().now();
    let normalized_path = path_svc::normalize(&raw_path)?;

    let capability_key = auth::authorize(
        ctx.db(),
        &key,
        &ctx.settings().application.key_pepper,
        auth::AuthRequest {
            required: Permission::Write,
            request_path: &normalized_path,
            author: None,
            types: &[],
        },
        now,
    )
    .await?;

    let file = files::get_or_create(ctx.db(), capability_key.workspace_id, &normalized_path).await?;
    files::set_content(ctx.db(), file.id, &body.content, now).await?;

    Ok((StatusCode::OK, Json(json!({ "ok": true, "path": normalized_path }))))
}

/// `DELETE /w/:key/*path` — soft-deletes (tombstones) the file.
pub async fn delete(
    State(ctx): State<AppContext>,
    Path((key, raw_path)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let now = ctx.clock().now();
    let normalized_path = path_svc::normalize(&raw_path)?;

    let capability_key = auth::authorize(
        ctx.db(),
        &key,
        &ctx.settings().application.key_pepper,
        auth::AuthRequest {
            required: Permission::Write,
            request_path: &normalized_path,
            author: None,
            types: &[],
        },
        now,
    )
    .await?;

    let file = files::fetch_by_path(ctx.db(), capability_key.workspace_id, &normalized_path)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::FileNotFound, "no file at this path"))?;

    files::soft_delete(ctx.db(), file.id).await?;

    Ok((StatusCode::OK, Json(json!({ "ok": true }))))
}
