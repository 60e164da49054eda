use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};

use crate::context::AppContext;
use crate::error::{AppError, ErrorCode};
use crate::models::append::AppendType;
use crate::models::capability::{Permission, ScopeType};
use crate::models::envelope::SuccessEnvelope;
use crate::models::request::{self, ParsedRequest};
use crate::repo::{appends, capabilities, files};
use crate::services::{append_machine, audit, auth, batch, idempotency, path as path_svc};

const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// `POST /a/:key/*path` — append at `append` tier. The file must already
/// exist.
pub async fn append_tier(
    State(ctx): State<AppContext>,
    Path((key, raw_path)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    dispatch(&ctx, &key, Permission::Append, &raw_path, false, headers, body).await
}

/// `POST /w/:key/*path` — append at `write` tier. Creates the file if it
/// doesn't exist yet.
pub async fn write_tier(
    State(ctx): State<AppContext>,
    Path((key, raw_path)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    dispatch(&ctx, &key, Permission::Write, &raw_path, true, headers, body).await
}

/// `POST /a/:key/append` — the file is named by the body's `path`, or
/// implied by a file-scoped key when the body omits it.
pub async fn append_by_body_path(
    State(ctx): State<AppContext>,
    Path(key): Path<String>,
    headers: HeaderMap,
    Json(mut body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let explicit_path = body
        .as_object_mut()
        .and_then(|obj| obj.remove("path"))
        .and_then(|v| v.as_str().map(str::to_string));

    let raw_path = match explicit_path {
        Some(p) => p,
        None => {
            let salted_hash = auth::hash_key(&key, &ctx.settings().application.key_pepper);
            let record = capabilities::fetch_by_hash(ctx.db(), &salted_hash).await?;
            match record.and_then(|k| k.scope_path) {
                Some(scope_path) if !scope_path.is_empty() => scope_path,
                _ => {
                    return Err(AppError::new(
                        ErrorCode::InvalidRequest,
                        "request must set `path` unless the key is file-scoped",
                    ))
                }
            }
        }
    };

    dispatch(&ctx, &key, Permission::Append, &raw_path, false, headers, body).await
}

async fn dispatch(
    ctx: &AppContext,
    key: &str,
    required: Permission,
    raw_path: &str,
    allow_create: bool,
    headers: HeaderMap,
    body: Value,
) -> Result<impl IntoResponse, AppError> {
    let now = ctx.clock().now();
    let normalized_path = path_svc::normalize(raw_path)?;
    let parsed = request::parse(body)?;
    let types: Vec<AppendType> = parsed.items.iter().map(|i| i.r#type).collect();

    let capability_key = auth::authorize(
        ctx.db(),
        key,
        &ctx.settings().application.key_pepper,
        auth::AuthRequest {
            required,
            request_path: &normalized_path,
            author: Some(&parsed.author),
            types: &types,
        },
        now,
    )
    .await?;

    let file = if allow_create {
        files::get_or_create(ctx.db(), capability_key.workspace_id, &normalized_path).await?
    } else {
        let found = files::fetch_by_path_including_deleted(ctx.db(), capability_key.workspace_id, &normalized_path)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::FileNotFound, "no file at this path"))?;

        if found.is_deleted() {
            return Err(AppError::new(ErrorCode::FileDeleted, "file has been deleted"));
        }

        found
    };

    if let Some(limit) = capability_key.wip_limit {
        if parsed.items.iter().any(|i| i.r#type == AppendType::Claim) {
            let current = appends::count_active_claims_for_author_in_workspace(
                ctx.db(),
                capability_key.workspace_id,
                &parsed.author,
                now,
            )
            .await?;

            if current >= limit {
                return Err(AppError::with_details(
                    ErrorCode::WipLimitExceeded,
                    "author has reached their work-in-progress limit",
                    json!({ "currentCount": current, "limit": limit }),
                ));
            }
        }
    }

    let idempotency_key = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    match idempotency_key {
        None => {
            let outcomes = run_batch(ctx, &file, capability_key.workspace_id, &parsed, now).await?;
            let body = success_body(&parsed, now, &outcomes);
            Ok((StatusCode::CREATED, Json(body)))
        }
        Some(token) => {
            run_idempotent(ctx, &file, &capability_key.id, capability_key.workspace_id, &parsed, &token, now).await
        }
    }
}

async fn run_idempotent(
    ctx: &AppContext,
    file: &crate::models::file::File,
    capability_key_id: &uuid::Uuid,
    workspace_id: uuid::Uuid,
    parsed: &ParsedRequest,
    token: &str,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    match idempotency::claim(ctx.db(), token, *capability_key_id, now).await? {
        idempotency::Claim::Cached { status, body } => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::OK);
            Ok((status, Json(body)))
        }
        idempotency::Claim::Pending => {
            let (status, body) =
                idempotency::wait_for_result(ctx.db(), token, *capability_key_id, &ctx.settings().idempotency).await?;
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::OK);
            Ok((status, Json(body)))
        }
        idempotency::Claim::Owner => {
            let result = run_batch(ctx, file, workspace_id, parsed, now).await;
            match result {
                Ok(outcomes) => {
                    let body = success_body(parsed, now, &outcomes);
                    idempotency::finalize(ctx.db(), token, *capability_key_id, 201, &body).await?;
                    Ok((StatusCode::CREATED, Json(body)))
                }
                Err(err) => {
                    idempotency::clear_pending(ctx.db(), token, *capability_key_id).await?;
                    Err(err)
                }
            }
        }
    }
}

async fn run_batch(
    ctx: &AppContext,
    file: &crate::models::file::File,
    workspace_id: uuid::Uuid,
    parsed: &ParsedRequest,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<Vec<append_machine::AppendOutcome>, AppError> {
    let outcomes = batch::execute(ctx.db(), file, workspace_id, parsed, &ctx.settings().claims, now).await?;

    for outcome in &outcomes {
        let event = crate::services::events::Event {
            workspace_id,
            file_path: file.path.clone(),
            name: outcome.event_name,
            data: outcome.event_data.clone(),
            timestamp: now,
        };
        ctx.events().emit(event.clone());
        ctx.webhooks().trigger(&event);

        audit::record(
            ctx.db(),
            workspace_id,
            &format!("append.{}", outcome.append_type),
            "append",
            &outcome.append_id,
            &parsed.author,
            Some(outcome.data.clone()),
            now,
        )
        .await;
    }

    Ok(outcomes)
}

fn success_body(
    parsed: &ParsedRequest,
    now: chrono::DateTime<chrono::Utc>,
    outcomes: &[append_machine::AppendOutcome],
) -> Value {
    let data = if outcomes.len() == 1 {
        outcomes[0].data.clone()
    } else {
        json!({ "results": outcomes.iter().map(|o| o.data.clone()).collect::<Vec<_>>() })
    };

    let envelope = SuccessEnvelope::new(now, data, web_url(&parsed.author));
    serde_json::to_value(envelope).expect("envelope always serializes")
}

fn web_url(author: &str) -> String {
    format!("http://{}/board?author={}", crate::config::settings().application.address(), author)
}
