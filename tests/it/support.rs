use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tower::ServiceExt;
use uuid::Uuid;

use boardline::config;
use boardline::context::AppContext;
use boardline::models::append::AppendType;
use boardline::models::capability::{Permission, ScopeType};
use boardline::repo::{capabilities, workspaces};
use boardline::services::auth::hash_key;
use boardline::services::events::EventBus;
use boardline::services::webhooks::WebhookDispatcher;
use boardline::time::SystemClock;

/// A fresh database, workspace, and wired-up router, isolated to one test.
/// Holding `_tmp` keeps the backing sqlite file alive for the test's
/// duration; it's removed on drop.
pub struct TestApp {
    pub router: Router,
    pub db: SqlitePool,
    pub workspace_id: Uuid,
    pub pepper: String,
    pub webhooks: WebhookDispatcher,
    _tmp: tempfile::NamedTempFile,
}

pub async fn spawn() -> TestApp {
    let settings = config::settings();

    let tmp = tempfile::NamedTempFile::new().expect("create temp sqlite file");
    let connect_options =
        SqliteConnectOptions::from_str(&format!("sqlite://{}", tmp.path().display()))
            .expect("valid sqlite connection string")
            .create_if_missing(true);

    let db = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(connect_options)
        .await
        .expect("sqlite connects");

    sqlx::migrate!("src/db/migrations")
        .run(&db)
        .await
        .expect("migrations run");

    let workspace = workspaces::insert(&db, "test-workspace")
        .await
        .expect("insert workspace");

    let webhooks = WebhookDispatcher::new(Duration::from_millis(settings.webhooks.request_timeout_ms));

    let ctx = AppContext::new(db.clone(), EventBus::new(), webhooks.clone(), Arc::new(SystemClock), settings);

    let router = boardline::routes::routes().with_state(ctx);

    TestApp {
        router,
        db,
        workspace_id: workspace.id,
        pepper: settings.application.key_pepper.clone(),
        webhooks,
        _tmp: tmp,
    }
}

impl TestApp {
    /// Issues a capability key scoped to this test's workspace and returns
    /// the plaintext the caller would put in the URL. Only the salted hash
    /// is ever persisted.
    #[allow(clippy::too_many_arguments)]
    pub async fn issue_key(
        &self,
        permission: Permission,
        scope_type: ScopeType,
        scope_path: Option<&str>,
        bound_author: Option<&str>,
        allowed_types: Option<&[AppendType]>,
        wip_limit: Option<i64>,
    ) -> String {
        let raw = format!("test-capability-key-{}", Uuid::new_v4().simple());
        let hash = hash_key(&raw, &self.pepper);

        capabilities::insert(
            &self.db,
            self.workspace_id,
            &hash,
            permission,
            scope_type,
            scope_path,
            bound_author,
            allowed_types,
            wip_limit,
            None,
        )
        .await
        .expect("insert capability key");

        raw
    }

    pub async fn workspace_key(&self, permission: Permission) -> String {
        self.issue_key(permission, ScopeType::Workspace, None, None, None, None)
            .await
    }

    pub async fn post(
        &self,
        uri: &str,
        idempotency_key: Option<&str>,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");

        if let Some(key) = idempotency_key {
            builder = builder.header("idempotency-key", key);
        }

        self.send(builder.body(Body::from(body.to_string())).unwrap()).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("response body is valid json")
        };

        (status, json)
    }
}
