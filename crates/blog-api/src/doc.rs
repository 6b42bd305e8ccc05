//! OpenAPI documentation
//!
//! [`ApiDoc`] collects every handler and response schema. It is served as
//! JSON at `/api-docs/openapi.json` and browsable under `/swagger-ui/`.

use crate::auth::{LoginRequest, LoginResponse, RegisterRequest, UpdateProfileRequest, UserInfo};
use crate::error::ApiError;
use crate::handlers::auth::RegisterResponse;
use crate::handlers::comments::{
    CommentCountResponse, CommentResponse, CreateCommentRequest, PostCommentResponse,
    PostCommentsResponse, UpdateCommentRequest,
};
use crate::handlers::health::HealthResponse;
use crate::handlers::posts::{PostListResponse, PostRequest, PostResponse};
use crate::handlers::MessageResponse;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Register the bearer token scheme referenced by protected paths
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .description(Some("Token returned by POST /login, valid for 24 hours."))
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Blog API",
        description = "Posts, comments and user accounts with token authentication.",
        license(name = "Apache-2.0")
    ),
    paths(
        crate::handlers::health::health_check,
        crate::handlers::auth::register_handler,
        crate::handlers::auth::login_handler,
        crate::handlers::auth::get_profile_handler,
        crate::handlers::auth::update_profile_handler,
        crate::handlers::posts::list_posts,
        crate::handlers::posts::get_post,
        crate::handlers::posts::create_post,
        crate::handlers::posts::update_post,
        crate::handlers::posts::delete_post,
        crate::handlers::comments::list_comments,
        crate::handlers::comments::get_comment,
        crate::handlers::comments::list_post_comments,
        crate::handlers::comments::count_post_comments,
        crate::handlers::comments::create_comment,
        crate::handlers::comments::update_comment,
        crate::handlers::comments::delete_comment,
    ),
    components(schemas(
        ApiError,
        MessageResponse,
        HealthResponse,
        RegisterRequest,
        RegisterResponse,
        LoginRequest,
        LoginResponse,
        UpdateProfileRequest,
        UserInfo,
        PostRequest,
        PostResponse,
        PostListResponse,
        CreateCommentRequest,
        UpdateCommentRequest,
        CommentResponse,
        PostCommentResponse,
        PostCommentsResponse,
        CommentCountResponse,
    )),
    tags(
        (name = "health", description = "Liveness"),
        (name = "auth", description = "Registration and login"),
        (name = "users", description = "Profile of the calling user"),
        (name = "posts", description = "Blog posts"),
        (name = "comments", description = "Comments on posts")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_scheme_is_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.as_ref().expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(components.schemas.contains_key("ApiError"));
    }

    #[test]
    fn test_protected_and_public_paths_are_documented() {
        let doc = ApiDoc::openapi();
        for path in ["/register", "/login", "/api/posts", "/api/posts/{id}", "/api/comments/{id}"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
