use axum::http::StatusCode;
use serde_json::json;

use boardline::models::capability::Permission;

use crate::support::spawn;

#[tokio::test]
async fn a_deleted_file_is_reported_as_gone_not_missing() {
    let app = spawn().await;
    let write_key = app.workspace_key(Permission::Write).await;
    let append_key = app.workspace_key(Permission::Append).await;

    app.post(
        &format!("/w/{write_key}/board.md"),
        None,
        json!({"author": "agent-a", "type": "task", "content": "Before the delete"}),
    )
    .await;

    let (status, _) = app.delete(&format!("/w/{write_key}/board.md")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .post(
            &format!("/a/{append_key}/board.md"),
            None,
            json!({"author": "agent-b", "type": "comment", "content": "too late"}),
        )
        .await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(body["error"]["code"], "FILE_DELETED");

    let (status, body) = app
        .post(
            &format!("/a/{append_key}/never-existed.md"),
            None,
            json!({"author": "agent-b", "type": "comment", "content": "nope"}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "FILE_NOT_FOUND");
}
