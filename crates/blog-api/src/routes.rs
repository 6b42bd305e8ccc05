//! API route definitions
//!
//! Author: hephaex@gmail.com

use crate::auth::auth_middleware;
use crate::handlers::{auth, comments, health, posts};
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

/// Create API routes
///
/// Reads are public. Every mutation sits behind [`auth_middleware`].
pub fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/register", post(auth::register_handler))
        .route("/login", post(auth::login_handler))
        .route("/api/posts", get(posts::list_posts))
        .route("/api/posts/:id", get(posts::get_post))
        .route("/api/posts/:id/comments", get(comments::list_post_comments))
        .route(
            "/api/posts/:id/comments/count",
            get(comments::count_post_comments),
        )
        .route("/api/comments", get(comments::list_comments))
        .route("/api/comments/:id", get(comments::get_comment));

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        .route(
            "/api/user/profile",
            get(auth::get_profile_handler).put(auth::update_profile_handler),
        )
        .route("/api/posts", post(posts::create_post))
        .route(
            "/api/posts/:id",
            put(posts::update_post).delete(posts::delete_post),
        )
        .route("/api/comments", post(comments::create_comment))
        .route(
            "/api/comments/:id",
            put(comments::update_comment).delete(comments::delete_comment),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    // Combine routes
    Router::new().merge(public_routes).merge(protected_routes)
}
