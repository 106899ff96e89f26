use axum::{Router, http::StatusCode, routing::any};

pub fn router() -> Router {
    Router::new()
        .route("/", any(|| async { "Creating my first http server" }))
        .route("/about", any(|| async { "About page" }))
        .fallback(|| async { (StatusCode::NOT_FOUND, "Page not found") })
}
