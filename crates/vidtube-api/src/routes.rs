use axum::{
    Router,
    http::StatusCode,
    middleware,
    response::Response,
    routing::{delete, get, patch, post},
};

use crate::middleware::{admin_gate, require_auth};
use crate::response::respond;
use crate::state::AppState;
use crate::{auth, users, videos};

/// The full `/api/v1` surface. Transport layers (CORS, tracing, body limit)
/// are added by the binary.
pub fn router(state: AppState) -> Router {
    let public_user_routes = Router::new()
        .route("/register", post(users::register))
        .route("/login", post(auth::login))
        .route("/refresh-token", post(auth::refresh_token));

    let admin_user_routes = Router::new()
        .route("/delete", delete(users::delete_user))
        .route("/getAll", get(users::get_all_users))
        .route_layer(middleware::from_fn_with_state(state.clone(), admin_gate));

    let protected_user_routes = Router::new()
        .route("/logout", post(auth::logout))
        .route("/change-password", post(users::change_password))
        .route("/currentUser", get(users::current_user))
        .route("/update", patch(users::update_details))
        .route("/update-avatar", patch(users::update_avatar))
        .route("/update-cover", patch(users::update_cover_image))
        .route("/channel/{username}", get(users::channel_profile))
        .route("/history", get(users::watch_history))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let video_routes = Router::new()
        .route("/create", post(videos::create_video))
        .route("/delete/{id}", delete(videos::delete_video))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .nest(
            "/api/v1/users",
            public_user_routes
                .merge(admin_user_routes)
                .merge(protected_user_routes),
        )
        .nest("/api/v1/videos", video_routes)
        .route("/api/v1/healthcheck", get(healthcheck))
        .with_state(state)
}

async fn healthcheck() -> Response {
    respond(StatusCode::OK, "OK", "Health check passed")
}
