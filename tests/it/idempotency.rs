use axum::http::StatusCode;
use serde_json::json;

use boardline::models::capability::Permission;

use crate::support::spawn;

#[tokio::test]
async fn replaying_the_same_idempotency_key_returns_the_cached_response() {
    let app = spawn().await;
    let write_key = app.workspace_key(Permission::Write).await;
    let append_key = app.workspace_key(Permission::Append).await;

    let (_, body) = app
        .post(
            &format!("/w/{write_key}/board.md"),
            None,
            json!({"author": "agent-a", "type": "task", "content": "Rotate the secrets"}),
        )
        .await;
    let task_ref = body["data"]["id"].as_str().unwrap().to_string();

    let claim_body = json!({"author": "agent-b", "type": "claim", "ref": task_ref});
    let idempotency_key = "retry-token-1";

    let (status_one, body_one) = app
        .post(&format!("/a/{append_key}/board.md"), Some(idempotency_key), claim_body.clone())
        .await;
    assert_eq!(status_one, StatusCode::CREATED);
    let first_append_id = body_one["data"]["id"].clone();

    let (status_two, body_two) = app
        .post(&format!("/a/{append_key}/board.md"), Some(idempotency_key), claim_body)
        .await;
    assert_eq!(status_two, status_one);
    assert_eq!(body_two, body_one);
    assert_eq!(body_two["data"]["id"], first_append_id);

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM appends WHERE type = 'claim'")
        .fetch_one(&app.db)
        .await
        .expect("count claims");
    assert_eq!(count.0, 1);
}

#[tokio::test]
async fn different_idempotency_keys_are_independent() {
    let app = spawn().await;
    let write_key = app.workspace_key(Permission::Write).await;
    let append_key = app.workspace_key(Permission::Append).await;

    let (_, body) = app
        .post(
            &format!("/w/{write_key}/board.md"),
            None,
            json!({"author": "agent-a", "type": "task", "content": "Write changelog entries"}),
        )
        .await;
    let task_ref = body["data"]["id"].as_str().unwrap().to_string();

    let (status_one, body_one) = app
        .post(
            &format!("/a/{append_key}/board.md"),
            Some("key-a"),
            json!({"author": "agent-b", "type": "comment", "ref": task_ref, "content": "first"}),
        )
        .await;
    let (status_two, body_two) = app
        .post(
            &format!("/a/{append_key}/board.md"),
            Some("key-b"),
            json!({"author": "agent-b", "type": "comment", "ref": task_ref, "content": "second"}),
        )
        .await;

    assert_eq!(status_one, StatusCode::CREATED);
    assert_eq!(status_two, StatusCode::CREATED);
    assert_ne!(body_one["data"]["id"], body_two["data"]["id"]);
}
