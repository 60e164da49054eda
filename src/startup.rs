use std::future::Future;
use std::net::TcpListener;
use std::sync::Arc;

use sqlx::SqlitePool;
use tower::limit::ConcurrencyLimitLayer;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::{self, DatabaseSettings};
use crate::context::AppContext;
use crate::cors::cors_layer;
use crate::routes::routes;
use crate::services::events::EventBus;
use crate::services::webhooks::WebhookDispatcher;
use crate::shutdown;
use crate::time::SystemClock;

pub fn run(
    listener: TcpListener,
    db: SqlitePool,
) -> anyhow::Result<impl Future<Output = anyhow::Result<()>>> {
    let settings = config::settings();
    let webhooks = WebhookDispatcher::new(std::time::Duration::from_millis(
        settings.webhooks.request_timeout_ms,
    ));
    let ctx = AppContext::new(db, EventBus::new(), webhooks, Arc::new(SystemClock), settings);

    let app = routes().with_state(ctx).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(ConcurrencyLimitLayer::new(256))
            .layer(cors_layer()),
    );

    listener.set_nonblocking(true)?;
    let listener = tokio::net::TcpListener::from_std(listener)?;

    let server = async move {
        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(shutdown::signal())
            .await?;
        Ok(())
    };

    Ok(server)
}

pub async fn connect_to_database(db_settings: &DatabaseSettings) -> anyhow::Result<SqlitePool> {
    crate::db::connect(db_settings).await
}
