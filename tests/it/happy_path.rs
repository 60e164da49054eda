use axum::http::StatusCode;
use serde_json::json;

use boardline::models::capability::Permission;

use crate::support::spawn;

#[tokio::test]
async fn task_claim_response_completes_the_task() {
    let app = spawn().await;
    let write_key = app.workspace_key(Permission::Write).await;
    let append_key = app.workspace_key(Permission::Append).await;

    let (status, body) = app
        .post(
            &format!("/w/{write_key}/board.md"),
            None,
            json!({"author": "agent-a", "type": "task", "content": "Fix the bug"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "open");
    let task_ref = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .post(
            &format!("/a/{append_key}/board.md"),
            None,
            json!({"author": "agent-b", "type": "claim", "ref": task_ref}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["type"], "claim");
    assert!(body["data"]["expiresAt"].is_string());

    let (status, body) = app
        .post(
            &format!("/a/{append_key}/board.md"),
            None,
            json!({"author": "agent-c", "type": "claim", "ref": task_ref}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "ALREADY_CLAIMED");
    assert_eq!(body["error"]["details"]["claimedBy"], "agent-b");

    let (status, body) = app
        .post(
            &format!("/a/{append_key}/board.md"),
            None,
            json!({"author": "agent-b", "type": "response", "ref": task_ref, "content": "fixed in a1b2c3"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["taskStatus"], "done");

    let (status, body) = app
        .post(
            &format!("/a/{append_key}/board.md"),
            None,
            json!({"author": "agent-d", "type": "claim", "ref": task_ref}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "TASK_ALREADY_COMPLETE");
}

#[tokio::test]
async fn cancel_reopens_the_task_for_others() {
    let app = spawn().await;
    let write_key = app.workspace_key(Permission::Write).await;
    let append_key = app.workspace_key(Permission::Append).await;

    let (_, body) = app
        .post(
            &format!("/w/{write_key}/board.md"),
            None,
            json!({"author": "agent-a", "type": "task", "content": "Write the docs"}),
        )
        .await;
    let task_ref = body["data"]["id"].as_str().unwrap().to_string();

    let (_, body) = app
        .post(
            &format!("/a/{append_key}/board.md"),
            None,
            json!({"author": "agent-b", "type": "claim", "ref": task_ref}),
        )
        .await;
    let claim_ref = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .post(
            &format!("/a/{append_key}/board.md"),
            None,
            json!({"author": "agent-c", "type": "cancel", "ref": claim_ref}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "CANNOT_CANCEL_OTHERS_CLAIM");

    let (status, body) = app
        .post(
            &format!("/a/{append_key}/board.md"),
            None,
            json!({"author": "agent-b", "type": "cancel", "ref": claim_ref}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["taskStatus"], "open");

    let (status, body) = app
        .post(
            &format!("/a/{append_key}/board.md"),
            None,
            json!({"author": "agent-d", "type": "claim", "ref": task_ref}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["author"], "agent-d");
}

#[tokio::test]
async fn blocked_and_answer_round_trip() {
    let app = spawn().await;
    let write_key = app.workspace_key(Permission::Write).await;
    let append_key = app.workspace_key(Permission::Append).await;

    let (_, body) = app
        .post(
            &format!("/w/{write_key}/board.md"),
            None,
            json!({"author": "agent-a", "type": "task", "content": "Ship the release"}),
        )
        .await;
    let task_ref = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .post(
            &format!("/a/{append_key}/board.md"),
            None,
            json!({"author": "agent-b", "type": "blocked", "ref": task_ref, "content": "waiting on credentials"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let blocked_ref = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .post(
            &format!("/a/{append_key}/board.md"),
            None,
            json!({"author": "agent-c", "type": "answer", "ref": blocked_ref, "content": "use the staging creds"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["ref"], blocked_ref);

    let (status, body) = app
        .post(
            &format!("/a/{append_key}/board.md"),
            None,
            json!({"author": "agent-c", "type": "answer", "ref": task_ref, "content": "this isn't a blocked append"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_REF");
}

#[tokio::test]
async fn vote_requires_a_plus_or_minus_one_value() {
    let app = spawn().await;
    let write_key = app.workspace_key(Permission::Write).await;
    let append_key = app.workspace_key(Permission::Append).await;

    let (_, body) = app
        .post(
            &format!("/w/{write_key}/board.md"),
            None,
            json!({"author": "agent-a", "type": "task", "content": "Pick a logo"}),
        )
        .await;
    let task_ref = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .post(
            &format!("/a/{append_key}/board.md"),
            None,
            json!({"author": "agent-b", "type": "vote", "ref": task_ref, "value": "maybe"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post(
            &format!("/a/{append_key}/board.md"),
            None,
            json!({"author": "agent-b", "type": "vote", "ref": task_ref, "value": "+1"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["value"], "+1");
}
