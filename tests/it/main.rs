mod support;

mod batch;
mod claims;
mod files;
mod happy_path;
mod idempotency;
mod webhooks;
