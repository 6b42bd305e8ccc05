//! Store traits for users, posts and comments
//!
//! Handlers depend on these traits only. [`crate::PgStore`] is the production
//! implementation; [`crate::InMemoryStore`] backs tests.

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    Comment, CommentId, CommentWithAuthor, NewComment, NewUser, Page, Post, PostContent, PostId,
    PostQuery, User, UserId, UserUpdate,
};

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write
    #[error("Duplicate value violates {0}")]
    Duplicate(String),

    /// The addressed record does not exist (or was deleted)
    #[error("{0} not found")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl StoreError {
    pub fn not_found(resource: &str) -> Self {
        StoreError::NotFound(resource.to_string())
    }
}

/// Credential store
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user. Fails with [`StoreError::Duplicate`] when the username
    /// or email is already taken, even under concurrent registration.
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Single combined lookup used by the registration pre-check
    async fn find_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<User>, StoreError>;

    async fn update_user(&self, id: UserId, update: UserUpdate) -> Result<User, StoreError>;
}

/// Post store
#[async_trait]
pub trait PostStore: Send + Sync {
    async fn create_post(&self, owner: UserId, content: PostContent) -> Result<Post, StoreError>;

    async fn get_post(&self, id: PostId) -> Result<Option<Post>, StoreError>;

    async fn list_posts(&self, query: &PostQuery) -> Result<Page<Post>, StoreError>;

    /// Replace the editable fields. Ownership is checked by the caller.
    async fn update_post(&self, id: PostId, content: PostContent) -> Result<Post, StoreError>;

    /// Delete a post together with its comments
    async fn delete_post(&self, id: PostId) -> Result<(), StoreError>;
}

/// Comment store
#[async_trait]
pub trait CommentStore: Send + Sync {
    /// Insert a comment. Fails with [`StoreError::NotFound`] when the post
    /// does not exist.
    async fn create_comment(&self, comment: NewComment) -> Result<Comment, StoreError>;

    async fn get_comment(&self, id: CommentId) -> Result<Option<Comment>, StoreError>;

    async fn list_comments(&self) -> Result<Vec<Comment>, StoreError>;

    /// Comments on a post, oldest first
    async fn list_comments_for_post(
        &self,
        post_id: PostId,
    ) -> Result<Vec<CommentWithAuthor>, StoreError>;

    async fn count_comments_for_post(&self, post_id: PostId) -> Result<i64, StoreError>;

    async fn update_comment(&self, id: CommentId, content: String) -> Result<Comment, StoreError>;

    async fn delete_comment(&self, id: CommentId) -> Result<(), StoreError>;
}
