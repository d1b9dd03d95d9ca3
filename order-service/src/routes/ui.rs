//! Static lookup UI.

use axum::Router;
use std::path::Path;
use tower_http::services::{ServeDir, ServeFile};

/// `/ui` serves `index.html`; `/static/*` serves any file under `web_dir`.
pub fn create_router<S>(web_dir: &Path) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route_service("/ui", ServeFile::new(web_dir.join("index.html")))
        .nest_service("/static", ServeDir::new(web_dir))
}
