//! Single-page app shell. Client-side routes under `/statics` all get `index.html`.

use axum::Router;
use std::path::Path;
use tower_http::services::{ServeDir, ServeFile};

pub fn shell_routes(static_dir: &Path) -> Router {
    let index = ServeFile::new(static_dir.join("index.html"));
    Router::new()
        .route_service("/", index.clone())
        .route_service("/statics", index.clone())
        .route_service("/statics/*path", index)
        .nest_service("/static", ServeDir::new(static_dir.join("static")))
}
