pub mod append_machine;
pub mod audit;
pub mod auth;
pub mod batch;
pub mod events;
pub mod idempotency;
pub mod path;
pub mod webhooks;
