use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::context::AppContext;
use crate::controllers::{append, files, health_check};

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(health_check::show))
        .route("/a/:key/append", post(append::append_by_body_path))
        .route("/a/:key/*path", post(append::append_tier))
        .route(
            "/w/:key/*path",
            post(append::write_tier).put(files::put).delete(files::delete),
        )
}
