use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::Settings;
use crate::services::events::EventBus;
use crate::services::webhooks::WebhookDispatcher;
use crate::time::Clock;

/// Shared application state threaded through every handler via axum's
/// `State` extractor. Cloning is cheap: the pool, bus, and dispatcher are
/// themselves `Arc`-backed or otherwise cheaply shareable.
#[derive(Clone)]
pub struct AppContext {
    db: SqlitePool,
    events: EventBus,
    webhooks: WebhookDispatcher,
    clock: Arc<dyn Clock>,
    settings: &'static Settings,
}

impl AppContext {
    pub fn new(
        db: SqlitePool,
        events: EventBus,
        webhooks: WebhookDispatcher,
        clock: Arc<dyn Clock>,
        settings: &'static Settings,
    ) -> Self {
        Self {
            db,
            events,
            webhooks,
            clock,
            settings,
        }
    }

    pub fn db(&self) -> &SqlitePool {
        &self.db
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn webhooks(&self) -> &WebhookDispatcher {
        &self.webhooks
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn settings(&self) -> &'static Settings {
        self.settings
    }
}
