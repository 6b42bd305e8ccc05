//! Post handlers
//!
//! Listing and reading are public. Creating requires authentication;
//! updating and deleting additionally require ownership.
//!
//! Author: hephaex@gmail.com

use super::MessageResponse;
use crate::auth::{ensure_owner, AuthenticatedUser};
use crate::error::AppError;
use crate::extract::{ApiPath, ApiQuery, ValidatedJson};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use blog_core::{Post, PostContent, PostId, PostQuery, SortOrder, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Post create/update body
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct PostRequest {
    #[validate(length(min = 1, max = 255, message = "title must be 1-255 characters"))]
    pub title: String,
    #[validate(length(min = 1, message = "content is required"))]
    pub content: String,
    #[serde(default)]
    pub published: bool,
    /// Ignored when `published` is true
    #[serde(default)]
    pub draft: bool,
}

impl PostRequest {
    fn into_content(self) -> PostContent {
        PostContent::new(self.title, self.content, self.published, self.draft)
    }
}

/// Post as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PostResponse {
    pub id: PostId,
    pub title: String,
    pub content: String,
    pub published: bool,
    pub draft: bool,
    /// Owner
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Post> for PostResponse {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            title: post.title,
            content: post.content,
            published: post.published,
            draft: post.draft,
            user_id: post.user_id,
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}

/// Listing query parameters
///
/// Unparseable paging values fall back to the defaults. Only an invalid
/// `user_id` is rejected.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListPostsParams {
    /// 1-indexed page (default 1)
    #[param(value_type = Option<u32>)]
    pub page: Option<String>,
    /// Page size (default 10, max 100)
    #[param(value_type = Option<u32>)]
    pub limit: Option<String>,
    /// `asc` or `desc` by creation time (default `desc`)
    pub sort: Option<String>,
    /// Case-insensitive title substring
    pub search: Option<String>,
    /// Only posts by this user
    #[param(value_type = Option<i64>)]
    pub user_id: Option<String>,
    /// `true` to include unpublished posts
    pub drafts: Option<String>,
}

fn parse_lenient(value: Option<&str>) -> Option<u32> {
    value.and_then(|v| v.trim().parse().ok())
}

impl ListPostsParams {
    fn into_query(self) -> Result<PostQuery, AppError> {
        let user_id = match self.user_id.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                raw.parse::<UserId>()
                    .map_err(|_| AppError::BadRequest("Invalid user_id".to_string()))?,
            ),
        };

        Ok(PostQuery {
            sort: SortOrder::parse_lenient(self.sort.as_deref()),
            search: self.search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
            user_id,
            include_drafts: self.drafts.as_deref() == Some("true"),
            ..PostQuery::default()
        }
        .with_paging(
            parse_lenient(self.page.as_deref()),
            parse_lenient(self.limit.as_deref()),
        ))
    }
}

/// One page of posts
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PostListResponse {
    pub page: u32,
    pub limit: u32,
    /// Matching posts across all pages
    pub total: i64,
    pub posts: Vec<PostResponse>,
}

async fn load_post(state: &AppState, id: PostId) -> Result<Post, AppError> {
    state
        .posts
        .get_post(id)
        .await?
        .ok_or_else(|| AppError::not_found("Post"))
}

/// List posts
#[utoipa::path(
    get,
    path = "/api/posts",
    tag = "posts",
    params(ListPostsParams),
    responses(
        (status = 200, description = "Page of posts", body = PostListResponse),
        (status = 400, description = "Invalid query parameters", body = crate::error::ApiError),
    )
)]
pub async fn list_posts(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<ListPostsParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = state.posts.list_posts(&params.into_query()?).await?;

    Ok(Json(PostListResponse {
        page: page.page,
        limit: page.limit,
        total: page.total,
        posts: page.items.into_iter().map(PostResponse::from).collect(),
    }))
}

/// Get a post
#[utoipa::path(
    get,
    path = "/api/posts/{id}",
    tag = "posts",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post", body = PostResponse),
        (status = 404, description = "Post not found", body = crate::error::ApiError),
    )
)]
pub async fn get_post(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<PostId>,
) -> Result<impl IntoResponse, AppError> {
    let post = load_post(&state, id).await?;

    Ok(Json(PostResponse::from(post)))
}

/// Create a post owned by the caller
#[utoipa::path(
    post,
    path = "/api/posts",
    tag = "posts",
    request_body = PostRequest,
    responses(
        (status = 201, description = "Post created", body = PostResponse),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_post(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    ValidatedJson(request): ValidatedJson<PostRequest>,
) -> Result<impl IntoResponse, AppError> {
    let post = state
        .posts
        .create_post(user.user_id, request.into_content())
        .await?;

    tracing::info!(post_id = post.id, user_id = user.user_id, "Post created");
    Ok((StatusCode::CREATED, Json(PostResponse::from(post))))
}

/// Update a post
#[utoipa::path(
    put,
    path = "/api/posts/{id}",
    tag = "posts",
    params(("id" = i64, Path, description = "Post ID")),
    request_body = PostRequest,
    responses(
        (status = 200, description = "Post updated", body = PostResponse),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
        (status = 403, description = "Caller does not own the post", body = crate::error::ApiError),
        (status = 404, description = "Post not found", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_post(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<PostId>,
    ValidatedJson(request): ValidatedJson<PostRequest>,
) -> Result<impl IntoResponse, AppError> {
    let post = load_post(&state, id).await?;
    ensure_owner(&post, &user, "post", id)?;

    let post = state.posts.update_post(id, request.into_content()).await?;

    Ok(Json(PostResponse::from(post)))
}

/// Delete a post and its comments
#[utoipa::path(
    delete,
    path = "/api/posts/{id}",
    tag = "posts",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post deleted", body = MessageResponse),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
        (status = 403, description = "Caller does not own the post", body = crate::error::ApiError),
        (status = 404, description = "Post not found", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_post(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<PostId>,
) -> Result<impl IntoResponse, AppError> {
    let post = load_post(&state, id).await?;
    ensure_owner(&post, &user, "post", id)?;

    state.posts.delete_post(id).await?;

    tracing::info!(post_id = id, user_id = user.user_id, "Post deleted");
    Ok(Json(MessageResponse::new("Post deleted successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use blog_core::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

    fn params(pairs: &[(&str, &str)]) -> ListPostsParams {
        let mut params = ListPostsParams::default();
        for (key, value) in pairs {
            let value = Some(value.to_string());
            match *key {
                "page" => params.page = value,
                "limit" => params.limit = value,
                "sort" => params.sort = value,
                "search" => params.search = value,
                "user_id" => params.user_id = value,
                "drafts" => params.drafts = value,
                other => panic!("unknown parameter {other}"),
            }
        }
        params
    }

    #[test]
    fn test_list_params_defaults() {
        let query = ListPostsParams::default().into_query().unwrap();
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, DEFAULT_PAGE_SIZE);
        assert_eq!(query.sort, SortOrder::Desc);
        assert!(!query.include_drafts);
        assert_eq!(query.search, None);
        assert_eq!(query.user_id, None);
    }

    #[test]
    fn test_list_params_mapping() {
        let query = params(&[
            ("page", "2"),
            ("limit", "1000"),
            ("sort", "asc"),
            ("search", "   "),
            ("user_id", "7"),
            ("drafts", "true"),
        ])
        .into_query()
        .unwrap();

        assert_eq!(query.page, 2);
        assert_eq!(query.limit, MAX_PAGE_SIZE);
        assert_eq!(query.sort, SortOrder::Asc);
        assert_eq!(query.search, None);
        assert_eq!(query.user_id, Some(7));
        assert!(query.include_drafts);
    }

    #[test]
    fn test_unparseable_paging_falls_back_to_defaults() {
        let query = params(&[("page", "-1"), ("limit", "abc"), ("drafts", "1")])
            .into_query()
            .unwrap();

        assert_eq!(query.page, 1);
        assert_eq!(query.limit, DEFAULT_PAGE_SIZE);
        assert!(!query.include_drafts);
    }

    #[test]
    fn test_invalid_user_id_is_rejected() {
        let result = params(&[("user_id", "abc")]).into_query();
        assert!(matches!(result, Err(AppError::BadRequest(ref m)) if m == "Invalid user_id"));

        let query = params(&[("user_id", "")]).into_query().unwrap();
        assert_eq!(query.user_id, None);
    }

    #[test]
    fn test_published_post_is_not_a_draft() {
        let request = PostRequest {
            title: "t".to_string(),
            content: "c".to_string(),
            published: true,
            draft: true,
        };

        let content = request.into_content();
        assert!(content.published);
        assert!(!content.draft);
    }
}
