pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};

use crate::actions::handlers;
use crate::creations::handlers as creations;
use crate::quota::require_account;
use crate::state::AppState;

/// Room for multipart framing and text fields around the largest accepted file.
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_resume_bytes + MULTIPART_OVERHEAD_BYTES;

    let ai = Router::new()
        .route(
            "/generate-article",
            post(handlers::handle_generate_article),
        )
        .route(
            "/generate-blog-title",
            post(handlers::handle_generate_blog_title),
        )
        .route("/generate-image", post(handlers::handle_generate_image))
        .route(
            "/remove-image-background",
            post(handlers::handle_remove_background),
        )
        .route(
            "/remove-image-object",
            post(handlers::handle_remove_object),
        )
        .route("/resume-review", post(handlers::handle_resume_review));

    let user = Router::new()
        .route(
            "/get-user-creations",
            get(creations::handle_user_creations),
        )
        .route(
            "/get-published-creations",
            get(creations::handle_published_creations),
        );

    let authenticated = Router::new()
        .nest("/api/ai", ai)
        .nest("/api/user", user)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_account,
        ));

    Router::new()
        .route("/health", get(health::health_handler))
        .merge(authenticated)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
