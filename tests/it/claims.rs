use axum::http::StatusCode;
use serde_json::json;

use boardline::models::capability::{Permission, ScopeType};

use crate::support::spawn;

#[tokio::test]
async fn wip_limit_blocks_a_second_concurrent_claim_by_the_same_author() {
    let app = spawn().await;
    let write_key = app.workspace_key(Permission::Write).await;
    let append_key = app
        .issue_key(Permission::Append, ScopeType::Workspace, None, None, None, Some(1))
        .await;

    let (_, body) = app
        .post(
            &format!("/w/{write_key}/board.md"),
            None,
            json!({"author": "agent-a", "type": "task", "content": "Task one"}),
        )
        .await;
    let task_one = body["data"]["id"].as_str().unwrap().to_string();

    let (_, body) = app
        .post(
            &format!("/w/{write_key}/board.md"),
            None,
            json!({"author": "agent-a", "type": "task", "content": "Task two"}),
        )
        .await;
    let task_two = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .post(
            &format!("/a/{append_key}/board.md"),
            None,
            json!({"author": "agent-x", "type": "claim", "ref": task_one}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .post(
            &format!("/a/{append_key}/board.md"),
            None,
            json!({"author": "agent-x", "type": "claim", "ref": task_two}),
        )
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "WIP_LIMIT_EXCEEDED");
}

#[tokio::test]
async fn renew_extends_expiry_for_the_claim_holder_only() {
    let app = spawn().await;
    let write_key = app.workspace_key(Permission::Write).await;
    let append_key = app.workspace_key(Permission::Append).await;

    let (_, body) = app
        .post(
            &format!("/w/{write_key}/board.md"),
            None,
            json!({"author": "agent-a", "type": "task", "content": "Long running job"}),
        )
        .await;
    let task_ref = body["data"]["id"].as_str().unwrap().to_string();

    let (_, body) = app
        .post(
            &format!("/a/{append_key}/board.md"),
            None,
            json!({"author": "agent-b", "type": "claim", "ref": task_ref, "expiresInSeconds": 60}),
        )
        .await;
    let claim_ref = body["data"]["id"].as_str().unwrap().to_string();
    let first_expiry = body["data"]["expiresAt"].as_str().unwrap().to_string();

    let (status, body) = app
        .post(
            &format!("/a/{append_key}/board.md"),
            None,
            json!({"author": "agent-z", "type": "renew", "ref": claim_ref}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "CANNOT_RENEW_OTHERS_CLAIM");

    let (status, body) = app
        .post(
            &format!("/a/{append_key}/board.md"),
            None,
            json!({"author": "agent-b", "type": "renew", "ref": claim_ref, "expiresInSeconds": 3600}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let renewed_expiry = body["data"]["expiresAt"].as_str().unwrap().to_string();
    assert_ne!(first_expiry, renewed_expiry);
    assert!(renewed_expiry > first_expiry);
}

#[tokio::test]
async fn reclaiming_as_the_same_author_renews_instead_of_inserting_a_row() {
    let app = spawn().await;
    let write_key = app.workspace_key(Permission::Write).await;
    let append_key = app.workspace_key(Permission::Append).await;

    let (_, body) = app
        .post(
            &format!("/w/{write_key}/board.md"),
            None,
            json!({"author": "agent-a", "type": "task", "content": "Heartbeat me"}),
        )
        .await;
    let task_ref = body["data"]["id"].as_str().unwrap().to_string();

    let (_, first) = app
        .post(
            &format!("/a/{append_key}/board.md"),
            None,
            json!({"author": "agent-b", "type": "claim", "ref": task_ref}),
        )
        .await;
    let first_id = first["data"]["id"].as_str().unwrap().to_string();

    let (status, second) = app
        .post(
            &format!("/a/{append_key}/board.md"),
            None,
            json!({"author": "agent-b", "type": "claim", "ref": task_ref}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(second["data"]["id"], first_id);

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM appends WHERE type = 'claim'")
        .fetch_one(&app.db)
        .await
        .expect("count claims");
    assert_eq!(count.0, 1);
}

#[tokio::test]
async fn claiming_a_non_task_ref_is_rejected_as_invalid_ref() {
    let app = spawn().await;
    let write_key = app.workspace_key(Permission::Write).await;
    let append_key = app.workspace_key(Permission::Append).await;

    let (_, body) = app
        .post(
            &format!("/w/{write_key}/board.md"),
            None,
            json!({"author": "agent-a", "type": "task", "content": "Needs a comment"}),
        )
        .await;
    let task_ref = body["data"]["id"].as_str().unwrap().to_string();

    let (_, body) = app
        .post(
            &format!("/a/{append_key}/board.md"),
            None,
            json!({"author": "agent-b", "type": "comment", "ref": task_ref, "content": "noted"}),
        )
        .await;
    let comment_ref = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .post(
            &format!("/a/{append_key}/board.md"),
            None,
            json!({"author": "agent-c", "type": "claim", "ref": comment_ref}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_REF");

    let (status, body) = app
        .post(
            &format!("/a/{append_key}/board.md"),
            None,
            json!({"author": "agent-c", "type": "claim", "ref": "a999"}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "APPEND_NOT_FOUND");
}
