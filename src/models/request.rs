use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::{AppError, ErrorCode};
use crate::models::append::AppendType;

const RESERVED_AUTHORS: &[&str] = &["system"];

#[derive(Debug, Deserialize, Default)]
struct RawItemFields {
    r#type: Option<String>,
    content: Option<String>,
    r#ref: Option<String>,
    priority: Option<String>,
    labels: Option<Vec<String>>,
    #[serde(rename = "dueAt")]
    due_at: Option<DateTime<Utc>>,
    #[allow(dead_code)]
    assigned: Option<String>,
    value: Option<String>,
    #[serde(rename = "expiresInSeconds")]
    expires_in_seconds: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawBody {
    author: String,
    #[serde(default)]
    appends: Option<Vec<RawItemFields>>,
    #[serde(flatten)]
    single: RawItemFields,
}

/// A single append item after type resolution, independent of whether it
/// arrived as the lone item in a single-append request or as one element of
/// a batch.
#[derive(Debug, Clone)]
pub struct AppendItem {
    pub r#type: AppendType,
    pub content: Option<String>,
    pub r#ref: Option<String>,
    pub priority: Option<String>,
    pub labels: Option<Vec<String>>,
    pub due_at: Option<DateTime<Utc>>,
    pub value: Option<String>,
    pub expires_in_seconds: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct ParsedRequest {
    pub author: String,
    pub items: Vec<AppendItem>,
}

impl ParsedRequest {
    pub fn is_batch(&self) -> bool {
        self.items.len() > 1
    }
}

/// Parses and validates a request body into its single- or batch-mode
/// items. Unknown append types and malformed authors are rejected here,
/// before any handler or authorization check ever sees the request — the
/// closed type set is enforced at this layer, not in the state machine.
pub fn parse(raw: serde_json::Value) -> Result<ParsedRequest, AppError> {
    let raw: RawBody = serde_json::from_value(raw)
        .map_err(|e| AppError::new(ErrorCode::InvalidRequest, format!("malformed request body: {e}")))?;

    validate_author(&raw.author)?;

    let has_single = raw.single.r#type.is_some();
    let items = match (raw.appends, has_single) {
        (Some(_), true) => {
            return Err(AppError::new(
                ErrorCode::InvalidRequest,
                "single-append fields must not coexist with `appends`",
            ))
        }
        (Some(appends), false) => {
            if appends.is_empty() {
                return Err(AppError::new(ErrorCode::InvalidRequest, "batch must contain at least one append"));
            }
            appends
                .into_iter()
                .map(resolve_item)
                .collect::<Result<Vec<_>, _>>()?
        }
        (None, true) => vec![resolve_item(raw.single)?],
        (None, false) => {
            return Err(AppError::new(
                ErrorCode::InvalidRequest,
                "request must set `type` or provide `appends`",
            ))
        }
    };

    Ok(ParsedRequest { author: raw.author, items })
}

fn resolve_item(raw: RawItemFields) -> Result<AppendItem, AppError> {
    let type_str = raw
        .r#type
        .ok_or_else(|| AppError::new(ErrorCode::InvalidRequest, "append is missing `type`"))?;

    let r#type = AppendType::from_str(&type_str)
        .map_err(|_| AppError::new(ErrorCode::InvalidAppendType, format!("unknown append type '{type_str}'")))?;

    Ok(AppendItem {
        r#type,
        content: raw.content,
        r#ref: raw.r#ref,
        priority: raw.priority,
        labels: raw.labels,
        due_at: raw.due_at,
        value: raw.value,
        expires_in_seconds: raw.expires_in_seconds,
    })
}

fn validate_author(author: &str) -> Result<(), AppError> {
    let valid_len = (1..=64).contains(&author.len());
    let valid_chars = author
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if !valid_len || !valid_chars || RESERVED_AUTHORS.contains(&author) {
        return Err(AppError::new(ErrorCode::InvalidAuthor, "author must be 1-64 chars of [A-Za-z0-9_-] and not reserved"));
    }

    Ok(())
}
