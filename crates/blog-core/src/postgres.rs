//! PostgreSQL store
//!
//! Implements the user, post and comment stores with SQLx. Posts and comments
//! are soft-deleted through `deleted_at`; users are never deleted.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::store::{CommentStore, PostStore, StoreError, UserStore};
use crate::{
    Comment, CommentId, CommentWithAuthor, NewComment, NewUser, Page, Post, PostContent, PostId,
    PostQuery, User, UserId, UserUpdate,
};

const USER_COLUMNS: &str = "id, username, email, password_hash, created_at, updated_at";
const POST_COLUMNS: &str = "id, title, content, published, draft, user_id, created_at, updated_at";
const COMMENT_COLUMNS: &str = "id, content, post_id, user_id, created_at, updated_at";

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new connection pool
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| StoreError::Database(format!("PostgreSQL connection failed: {e}")))?;

        tracing::info!(
            max_connections = config.max_connections,
            "Connected to PostgreSQL"
        );
        Ok(Self { pool })
    }

    /// Create from an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the embedded schema migrations
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to run migrations: {e}")))?;
        tracing::info!("Database migrations applied");
        Ok(())
    }
}

/// Translate constraint violations into typed store errors
fn write_error(err: sqlx::Error, action: &str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let constraint = db_err.constraint().unwrap_or("unique constraint");
            return StoreError::Duplicate(constraint.to_string());
        }
        if db_err.is_foreign_key_violation() {
            return StoreError::NotFound(match db_err.constraint() {
                Some("comments_post_id_fkey") => "Post".to_string(),
                Some(c) if c.ends_with("user_id_fkey") => "User".to_string(),
                _ => "Referenced record".to_string(),
            });
        }
    }
    StoreError::Database(format!("Failed to {action}: {err}"))
}

fn read_error(err: sqlx::Error, action: &str) -> StoreError {
    StoreError::Database(format!("Failed to {action}: {err}"))
}

/// Escape LIKE metacharacters so user input matches literally
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn push_post_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &PostQuery) {
    qb.push(" WHERE deleted_at IS NULL");
    if !query.include_drafts {
        qb.push(" AND published = TRUE");
    }
    if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
        qb.push(" AND title ILIKE ")
            .push_bind(format!("%{}%", escape_like(search)));
    }
    if let Some(user_id) = query.user_id {
        qb.push(" AND user_id = ").push_bind(user_id);
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, email, password_hash) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| write_error(e, "create user"))
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| read_error(e, "fetch user"))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| read_error(e, "fetch user"))
    }

    async fn find_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1 OR email = $2 LIMIT 1"
        ))
        .bind(username)
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| read_error(e, "check existing user"))
    }

    async fn update_user(&self, id: UserId, update: UserUpdate) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET username = COALESCE($2, username),
                email = COALESCE($3, email),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&update.username)
        .bind(&update.email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| write_error(e, "update user"))?
        .ok_or_else(|| StoreError::not_found("User"))
    }
}

#[async_trait]
impl PostStore for PgStore {
    async fn create_post(&self, owner: UserId, content: PostContent) -> Result<Post, StoreError> {
        sqlx::query_as::<_, Post>(&format!(
            r#"
            INSERT INTO posts (title, content, published, draft, user_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(&content.title)
        .bind(&content.content)
        .bind(content.published)
        .bind(content.draft)
        .bind(owner)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| write_error(e, "create post"))
    }

    async fn get_post(&self, id: PostId) -> Result<Option<Post>, StoreError> {
        sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| read_error(e, "fetch post"))
    }

    async fn list_posts(&self, query: &PostQuery) -> Result<Page<Post>, StoreError> {
        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM posts");
        push_post_filters(&mut count_qb, query);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| read_error(e, "count posts"))?;

        let order = query.sort.as_sql();
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {POST_COLUMNS} FROM posts"));
        push_post_filters(&mut qb, query);
        qb.push(format!(" ORDER BY created_at {order}, id {order}"))
            .push(" LIMIT ")
            .push_bind(i64::from(query.limit))
            .push(" OFFSET ")
            .push_bind(query.offset());

        let items = qb
            .build_query_as::<Post>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| read_error(e, "list posts"))?;

        Ok(Page {
            items,
            total,
            page: query.page,
            limit: query.limit,
        })
    }

    async fn update_post(&self, id: PostId, content: PostContent) -> Result<Post, StoreError> {
        sqlx::query_as::<_, Post>(&format!(
            r#"
            UPDATE posts
            SET title = $2, content = $3, published = $4, draft = $5, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&content.title)
        .bind(&content.content)
        .bind(content.published)
        .bind(content.draft)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| write_error(e, "update post"))?
        .ok_or_else(|| StoreError::not_found("Post"))
    }

    async fn delete_post(&self, id: PostId) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| read_error(e, "begin transaction"))?;

        let deleted = sqlx::query(
            "UPDATE posts SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| write_error(e, "delete post"))?;

        if deleted.rows_affected() == 0 {
            return Err(StoreError::not_found("Post"));
        }

        sqlx::query(
            "UPDATE comments SET deleted_at = NOW() WHERE post_id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| write_error(e, "delete post comments"))?;

        tx.commit()
            .await
            .map_err(|e| write_error(e, "commit post deletion"))
    }
}

#[async_trait]
impl CommentStore for PgStore {
    async fn create_comment(&self, comment: NewComment) -> Result<Comment, StoreError> {
        // Insert only when the post is live, in a single statement
        sqlx::query_as::<_, Comment>(&format!(
            r#"
            INSERT INTO comments (content, post_id, user_id)
            SELECT $1, $2, $3
            WHERE EXISTS (SELECT 1 FROM posts WHERE id = $2 AND deleted_at IS NULL)
            RETURNING {COMMENT_COLUMNS}
            "#
        ))
        .bind(&comment.content)
        .bind(comment.post_id)
        .bind(comment.user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| write_error(e, "create comment"))?
        .ok_or_else(|| StoreError::not_found("Post"))
    }

    async fn get_comment(&self, id: CommentId) -> Result<Option<Comment>, StoreError> {
        sqlx::query_as::<_, Comment>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| read_error(e, "fetch comment"))
    }

    async fn list_comments(&self) -> Result<Vec<Comment>, StoreError> {
        sqlx::query_as::<_, Comment>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE deleted_at IS NULL ORDER BY created_at, id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| read_error(e, "list comments"))
    }

    async fn list_comments_for_post(
        &self,
        post_id: PostId,
    ) -> Result<Vec<CommentWithAuthor>, StoreError> {
        sqlx::query_as::<_, CommentWithAuthor>(
            r#"
            SELECT c.id, c.content, c.post_id, c.user_id, u.username, c.created_at, c.updated_at
            FROM comments c
            JOIN users u ON u.id = c.user_id
            WHERE c.post_id = $1 AND c.deleted_at IS NULL
            ORDER BY c.created_at, c.id
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| read_error(e, "list post comments"))
    }

    async fn count_comments_for_post(&self, post_id: PostId) -> Result<i64, StoreError> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM comments WHERE post_id = $1 AND deleted_at IS NULL",
        )
        .bind(post_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| read_error(e, "count comments"))
    }

    async fn update_comment(&self, id: CommentId, content: String) -> Result<Comment, StoreError> {
        sqlx::query_as::<_, Comment>(&format!(
            r#"
            UPDATE comments SET content = $2, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {COMMENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&content)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| write_error(e, "update comment"))?
        .ok_or_else(|| StoreError::not_found("Comment"))
    }

    async fn delete_comment(&self, id: CommentId) -> Result<(), StoreError> {
        let deleted = sqlx::query(
            "UPDATE comments SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, "delete comment"))?;

        if deleted.rows_affected() == 0 {
            return Err(StoreError::not_found("Comment"));
        }
        Ok(())
    }
}
