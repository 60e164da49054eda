pub mod append_counters;
pub mod appends;
pub mod audit;
pub mod capabilities;
pub mod files;
pub mod idempotency;
pub mod workspaces;
