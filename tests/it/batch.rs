use axum::http::StatusCode;
use serde_json::json;

use boardline::models::capability::Permission;
use boardline::repo::appends;

use crate::support::spawn;

#[tokio::test]
async fn a_batch_commits_all_items_together() {
    let app = spawn().await;
    let write_key = app.workspace_key(Permission::Write).await;
    let append_key = app.workspace_key(Permission::Append).await;

    let (_, body) = app
        .post(
            &format!("/w/{write_key}/board.md"),
            None,
            json!({"author": "agent-a", "type": "task", "content": "Batch target"}),
        )
        .await;
    let task_ref = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .post(
            &format!("/a/{append_key}/board.md"),
            None,
            json!({
                "author": "agent-b",
                "appends": [
                    {"type": "claim", "ref": task_ref},
                    {"type": "comment", "ref": task_ref, "content": "starting now"},
                ],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let results = body["data"]["results"].as_array().expect("batch returns results array");
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["type"], "claim");
    assert_eq!(results[1]["type"], "comment");
}

#[tokio::test]
async fn a_failing_item_rolls_back_every_item_in_the_batch() {
    let app = spawn().await;
    let write_key = app.workspace_key(Permission::Write).await;
    let append_key = app.workspace_key(Permission::Append).await;

    let (_, body) = app
        .post(
            &format!("/w/{write_key}/board.md"),
            None,
            json!({"author": "agent-a", "type": "task", "content": "Batch rollback target"}),
        )
        .await;
    let task_ref = body["data"]["id"].as_str().unwrap().to_string();

    let file = boardline::repo::files::fetch_by_path(&app.db, app.workspace_id, "/board.md")
        .await
        .expect("fetch file")
        .expect("file exists");

    let (status, body) = app
        .post(
            &format!("/a/{append_key}/board.md"),
            None,
            json!({
                "author": "agent-b",
                "appends": [
                    {"type": "comment", "ref": task_ref, "content": "this one would succeed alone"},
                    {"type": "claim", "ref": "a999"},
                ],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "APPEND_NOT_FOUND");

    let comments = appends::fetch_by_ref(&app.db, file.id, &task_ref)
        .await
        .expect("fetch appends by ref");
    assert!(
        comments.is_empty(),
        "the comment from the failed batch must not have been committed"
    );
}
