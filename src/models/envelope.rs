use chrono::{DateTime, Utc};
use serde::Serialize;

use super::JsonValue;

/// The success response envelope every append endpoint returns on 201.
/// `data` always carries `id`, `type`, `author`, `ts` plus a handler-specific
/// patch (see `services::append_machine::HandlerOutcome`).
#[derive(Debug, Serialize)]
pub struct SuccessEnvelope {
    pub ok: bool,
    #[serde(rename = "serverTime")]
    pub server_time: DateTime<Utc>,
    pub data: JsonValue,
    #[serde(rename = "webUrl")]
    pub web_url: String,
}

impl SuccessEnvelope {
    pub fn new(now: DateTime<Utc>, data: JsonValue, web_url: String) -> Self {
        Self {
            ok: true,
            server_time: now,
            data,
            web_url,
        }
    }
}
