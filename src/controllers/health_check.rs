use std::time::Duration;

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_with::serde_as;
use sqlx::SqlitePool;
use tokio::time::Instant;

use crate::context::AppContext;

#[serde_as]
#[derive(Debug, Serialize)]
pub struct HealthCheck {
    #[serde_as(as = "serde_with::DisplayFromStr")]
    current_time: DateTime<Utc>,
    #[serde_as(as = "Option<serde_with::DurationSecondsWithFrac<String>>")]
    db_ping_seconds: Option<Duration>,
}

pub async fn show(State(ctx): State<AppContext>) -> Json<HealthCheck> {
    Json(HealthCheck {
        current_time: Utc::now(),
        db_ping_seconds: ping(ctx.db()).await,
    })
}

async fn ping(db: &SqlitePool) -> Option<Duration> {
    let start = Instant::now();

    let res = sqlx::query("SELECT 1").execute(db).await;

    match res {
        Ok(_) => Some(Instant::now() - start),
        Err(_) => None,
    }
}
