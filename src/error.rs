use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use tracing::error;

/// Stable error codes surfaced in the response envelope (see `ErrorEnvelope`).
/// Each variant maps to exactly one HTTP status, per the authorization and
/// state-machine contracts in the append subsystem design.
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidRequest,
    InvalidPath,
    InvalidKey,
    KeyRevoked,
    KeyExpired,
    PermissionDenied,
    InvalidAuthor,
    AuthorMismatch,
    TypeNotAllowed,
    InvalidAppendType,
    InvalidRef,
    AppendNotFound,
    FileNotFound,
    FileDeleted,
    AlreadyClaimed,
    TaskAlreadyComplete,
    WipLimitExceeded,
    CannotCancelOthersClaim,
    CannotRenewOthersClaim,
    PayloadTooLarge,
    IdempotencyConflict,
    Internal,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        use ErrorCode::*;
        match self {
            InvalidRequest | InvalidPath | AuthorMismatch | TypeNotAllowed | InvalidRef
            | CannotCancelOthersClaim | CannotRenewOthersClaim | InvalidAppendType
            | InvalidAuthor | TaskAlreadyComplete => StatusCode::BAD_REQUEST,
            InvalidKey | KeyRevoked | KeyExpired | PermissionDenied | AppendNotFound
            | FileNotFound => StatusCode::NOT_FOUND,
            FileDeleted => StatusCode::GONE,
            AlreadyClaimed | IdempotencyConflict => StatusCode::CONFLICT,
            WipLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    ok: bool,
    error: ErrorBody,
}

/// Application errors that carry enough information to render the response
/// envelope described in the external interface. Every variant other than
/// the infrastructure ones (`Sqlx`, `Serde`, `Other`) corresponds to a named
/// error code a client can branch on.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{code}: {message}")]
    Coded {
        code: ErrorCode,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("database error")]
    Sqlx(#[from] sqlx::Error),

    #[error("json serialization error")]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Coded {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(
        code: ErrorCode,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self::Coded {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Coded { code, .. } => *code,
            AppError::Sqlx(_) | AppError::Serde(_) | AppError::Other(_) => ErrorCode::Internal,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let code = self.code();
        let status = code.status();

        if status.is_server_error() {
            error!(error = ?self, "request failed");
        }

        let (message, details) = match &self {
            AppError::Coded {
                message, details, ..
            } => (message.clone(), details.clone()),
            other => (other.to_string(), None),
        };

        let body = Json(ErrorEnvelope {
            ok: false,
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        });

        (status, body).into_response()
    }
}
