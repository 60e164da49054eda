use std::sync::Arc;
use std::time::Duration;

use axum::routing::post;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use uuid::Uuid;

use boardline::models::capability::{Permission, ScopeType};
use boardline::services::webhooks::Subscription;

use crate::support::spawn;

#[tokio::test]
async fn a_registered_webhook_receives_the_append_event() {
    let app = spawn().await;
    let write_key = app.workspace_key(Permission::Write).await;

    let received: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();

    let mock_router = Router::new().route(
        "/hook",
        post(move |Json(body): Json<Value>| {
            let sink = sink.clone();
            async move {
                sink.lock().push(body);
            }
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, mock_router).await.ok();
    });

    app.webhooks.register(Subscription {
        id: Uuid::new_v4(),
        workspace_id: app.workspace_id,
        url: format!("http://{addr}/hook").parse().expect("valid url"),
        scope_type: ScopeType::Workspace,
        scope_path: None,
    });

    app.post(
        &format!("/w/{write_key}/board.md"),
        None,
        json!({"author": "agent-a", "type": "task", "content": "Notify webhooks"}),
    )
    .await;

    let mut attempts = 0;
    while received.lock().is_empty() && attempts < 50 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        attempts += 1;
    }

    let payloads = received.lock();
    assert_eq!(payloads.len(), 1, "expected exactly one webhook delivery");
    assert_eq!(payloads[0]["event"], "task.created");
    assert_eq!(payloads[0]["workspace_id"], app.workspace_id.to_string());
    assert_eq!(payloads[0]["file_path"], "/board.md");
    assert_eq!(payloads[0]["data"]["author"], "agent-a");
}
