//! Blog Core - Domain models, configuration and persistence
//!
//! This crate defines the core abstractions used by the blog backend:
//! - User identities, posts and comments
//! - Ownership of mutable resources
//! - Store traits and their PostgreSQL / in-memory implementations
//! - Configuration management

pub mod config;
pub mod memory;
pub mod postgres;
pub mod store;

pub use config::{AppConfig, AuthConfig, ConfigError, DatabaseConfig, PasswordConfig};
pub use memory::InMemoryStore;
pub use postgres::PgStore;
pub use store::{CommentStore, PostStore, StoreError, UserStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Numeric user identifier
pub type UserId = i64;
/// Numeric post identifier
pub type PostId = i64;
/// Numeric comment identifier
pub type CommentId = i64;

/// Default number of posts per listing page
pub const DEFAULT_PAGE_SIZE: u32 = 10;
/// Upper bound for the `limit` of a listing page
pub const MAX_PAGE_SIZE: u32 = 100;

// ============================================================================
// Ownership
// ============================================================================

/// A resource whose mutations are restricted to the identity that created it.
///
/// The owner is fixed at creation and never changes afterwards.
pub trait Ownable {
    fn owner_id(&self) -> UserId;
}

// ============================================================================
// Users
// ============================================================================

/// Registered account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    /// Argon2id PHC string, never serialized
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Values required to insert a user. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Partial profile update; `None` keeps the current value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none()
    }
}

// ============================================================================
// Posts
// ============================================================================

/// Blog post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub content: String,
    pub published: bool,
    pub draft: bool,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ownable for Post {
    fn owner_id(&self) -> UserId {
        self.user_id
    }
}

/// Editable post content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostContent {
    pub title: String,
    pub content: String,
    pub published: bool,
    pub draft: bool,
}

impl PostContent {
    /// Build post content, making the publish flags mutually exclusive
    pub fn new(title: String, content: String, published: bool, draft: bool) -> Self {
        let (published, draft) = normalize_publish_flags(published, draft);
        Self {
            title,
            content,
            published,
            draft,
        }
    }
}

/// A published post is never a draft; otherwise the flags are kept as given.
pub fn normalize_publish_flags(published: bool, draft: bool) -> (bool, bool) {
    if published {
        (true, false)
    } else {
        (false, draft)
    }
}

/// Creation order of a post listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// Anything other than `asc` sorts newest first
    pub fn parse_lenient(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("asc") => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Filters and paging for post listings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostQuery {
    /// 1-indexed page
    pub page: u32,
    pub limit: u32,
    pub sort: SortOrder,
    /// Case-insensitive substring of the title
    pub search: Option<String>,
    pub user_id: Option<UserId>,
    /// Include posts that are not published
    pub include_drafts: bool,
}

impl Default for PostQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
            sort: SortOrder::Desc,
            search: None,
            user_id: None,
            include_drafts: false,
        }
    }
}

impl PostQuery {
    /// Apply paging defaults: zero or missing page becomes 1, zero or missing
    /// limit becomes the default, and limit is capped at [`MAX_PAGE_SIZE`].
    pub fn with_paging(mut self, page: Option<u32>, limit: Option<u32>) -> Self {
        self.page = page.filter(|p| *p > 0).unwrap_or(1);
        self.limit = limit
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE);
        self
    }

    pub fn offset(&self) -> i64 {
        (i64::from(self.page) - 1) * i64::from(self.limit)
    }
}

/// One page of a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
}

// ============================================================================
// Comments
// ============================================================================

/// Comment on a post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: CommentId,
    pub content: String,
    pub post_id: PostId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ownable for Comment {
    fn owner_id(&self) -> UserId {
        self.user_id
    }
}

/// Values required to insert a comment
#[derive(Debug, Clone)]
pub struct NewComment {
    pub content: String,
    pub post_id: PostId,
    pub user_id: UserId,
}

/// Comment joined with its author's username
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct CommentWithAuthor {
    pub id: CommentId,
    pub content: String,
    pub post_id: PostId,
    pub user_id: UserId,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
