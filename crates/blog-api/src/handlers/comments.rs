//! Comment handlers
//!
//! Author: hephaex@gmail.com

use super::MessageResponse;
use crate::auth::{ensure_owner, AuthenticatedUser};
use crate::error::AppError;
use crate::extract::{ApiPath, ValidatedJson};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use blog_core::{Comment, CommentId, CommentWithAuthor, NewComment, PostId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use validator::Validate;

/// New comment body
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct CreateCommentRequest {
    #[validate(length(min = 1, message = "content is required"))]
    pub content: String,
    #[validate(range(min = 1, message = "post_id must be a positive id"))]
    pub post_id: PostId,
}

/// Comment edit body
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct UpdateCommentRequest {
    #[validate(length(min = 1, message = "content is required"))]
    pub content: String,
}

/// Comment as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommentResponse {
    pub id: CommentId,
    pub content: String,
    pub post_id: PostId,
    /// Author
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Comment> for CommentResponse {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            content: comment.content,
            post_id: comment.post_id,
            user_id: comment.user_id,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        }
    }
}

/// Comment with the author's username
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PostCommentResponse {
    pub id: CommentId,
    pub content: String,
    pub user_id: UserId,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl From<CommentWithAuthor> for PostCommentResponse {
    fn from(comment: CommentWithAuthor) -> Self {
        Self {
            id: comment.id,
            content: comment.content,
            user_id: comment.user_id,
            username: comment.username,
            created_at: comment.created_at,
        }
    }
}

/// Comments of one post
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PostCommentsResponse {
    pub post_id: PostId,
    pub comments: Vec<PostCommentResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CommentCountResponse {
    pub post_id: PostId,
    pub total_comments: i64,
}

async fn load_comment(state: &AppState, id: CommentId) -> Result<Comment, AppError> {
    state
        .comments
        .get_comment(id)
        .await?
        .ok_or_else(|| AppError::not_found("Comment"))
}

/// List all comments
#[utoipa::path(
    get,
    path = "/api/comments",
    tag = "comments",
    responses(
        (status = 200, description = "All comments", body = [CommentResponse]),
    )
)]
pub async fn list_comments(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let comments = state.comments.list_comments().await?;

    Ok(Json(
        comments
            .into_iter()
            .map(CommentResponse::from)
            .collect::<Vec<_>>(),
    ))
}

/// Get a comment
#[utoipa::path(
    get,
    path = "/api/comments/{id}",
    tag = "comments",
    params(("id" = i64, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Comment", body = CommentResponse),
        (status = 404, description = "Comment not found", body = crate::error::ApiError),
    )
)]
pub async fn get_comment(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<CommentId>,
) -> Result<impl IntoResponse, AppError> {
    let comment = load_comment(&state, id).await?;

    Ok(Json(CommentResponse::from(comment)))
}

/// Comments on a post, oldest first
#[utoipa::path(
    get,
    path = "/api/posts/{id}/comments",
    tag = "comments",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Comments with author names", body = PostCommentsResponse),
    )
)]
pub async fn list_post_comments(
    State(state): State<Arc<AppState>>,
    ApiPath(post_id): ApiPath<PostId>,
) -> Result<impl IntoResponse, AppError> {
    let comments = state.comments.list_comments_for_post(post_id).await?;

    Ok(Json(PostCommentsResponse {
        post_id,
        comments: comments.into_iter().map(PostCommentResponse::from).collect(),
    }))
}

/// Number of comments on a post
#[utoipa::path(
    get,
    path = "/api/posts/{id}/comments/count",
    tag = "comments",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Comment count", body = CommentCountResponse),
    )
)]
pub async fn count_post_comments(
    State(state): State<Arc<AppState>>,
    ApiPath(post_id): ApiPath<PostId>,
) -> Result<impl IntoResponse, AppError> {
    let total_comments = state.comments.count_comments_for_post(post_id).await?;

    Ok(Json(CommentCountResponse {
        post_id,
        total_comments,
    }))
}

/// Comment on a post as the caller
#[utoipa::path(
    post,
    path = "/api/comments",
    tag = "comments",
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment created", body = CommentResponse),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
        (status = 404, description = "Post not found", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_comment(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    ValidatedJson(request): ValidatedJson<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let comment = state
        .comments
        .create_comment(NewComment {
            content: request.content,
            post_id: request.post_id,
            user_id: user.user_id,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(CommentResponse::from(comment))))
}

/// Edit a comment
#[utoipa::path(
    put,
    path = "/api/comments/{id}",
    tag = "comments",
    params(("id" = i64, Path, description = "Comment ID")),
    request_body = UpdateCommentRequest,
    responses(
        (status = 200, description = "Comment updated", body = CommentResponse),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
        (status = 403, description = "Caller did not write the comment", body = crate::error::ApiError),
        (status = 404, description = "Comment not found", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_comment(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<CommentId>,
    ValidatedJson(request): ValidatedJson<UpdateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let comment = load_comment(&state, id).await?;
    ensure_owner(&comment, &user, "comment", id)?;

    let comment = state.comments.update_comment(id, request.content).await?;

    Ok(Json(CommentResponse::from(comment)))
}

/// Delete a comment
#[utoipa::path(
    delete,
    path = "/api/comments/{id}",
    tag = "comments",
    params(("id" = i64, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Comment deleted", body = MessageResponse),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
        (status = 403, description = "Caller did not write the comment", body = crate::error::ApiError),
        (status = 404, description = "Comment not found", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_comment(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<CommentId>,
) -> Result<impl IntoResponse, AppError> {
    let comment = load_comment(&state, id).await?;
    ensure_owner(&comment, &user, "comment", id)?;

    state.comments.delete_comment(id).await?;

    Ok(Json(MessageResponse::new("Comment deleted successfully")))
}
