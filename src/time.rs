//! Centralizes the notion of "now" used by the append state machine, the
//! idempotency broker, and claim expiry checks. A single `Clock` is captured
//! once per request so that every comparison within that request (expiry,
//! idempotency timestamps, renewal windows) agrees on the same instant.

use chrono::{DateTime, Utc};

/// Source of the current wall-clock time. The production implementation
/// reads the system clock; tests substitute a fixed instant so that claim
/// expiry and renewal math is deterministic.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
