pub mod append;
pub mod capability;
pub mod envelope;
pub mod file;
pub mod idempotency;
pub mod request;
pub mod workspace;

pub type JsonObject = serde_json::value::Map<String, serde_json::Value>;
pub type JsonValue = serde_json::Value;
