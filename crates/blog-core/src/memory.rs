//! In-memory store
//!
//! Same contract as [`crate::PgStore`], including username/email uniqueness
//! checked atomically with the insert. Used by tests and local experiments.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::store::{CommentStore, PostStore, StoreError, UserStore};
use crate::{
    Comment, CommentId, CommentWithAuthor, NewComment, NewUser, Page, Post, PostContent, PostId,
    PostQuery, SortOrder, User, UserId, UserUpdate,
};

#[derive(Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    posts: BTreeMap<PostId, Post>,
    comments: BTreeMap<CommentId, Comment>,
    last_user_id: UserId,
    last_post_id: PostId,
    last_comment_id: CommentId,
}

impl Tables {
    fn conflicting_user(
        &self,
        except: Option<UserId>,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Option<&'static str> {
        self.users
            .values()
            .filter(|u| Some(u.id) != except)
            .find_map(|u| {
                if username == Some(u.username.as_str()) {
                    Some("users_username_key")
                } else if email == Some(u.email.as_str()) {
                    Some("users_email_key")
                } else {
                    None
                }
            })
    }
}

/// In-memory implementation of all stores
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        if let Some(constraint) =
            tables.conflicting_user(None, Some(&user.username), Some(&user.email))
        {
            return Err(StoreError::Duplicate(constraint.to_string()));
        }

        tables.last_user_id += 1;
        let now = Utc::now();
        let created = User {
            id: tables.last_user_id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.username == username || u.email == email)
            .cloned())
    }

    async fn update_user(&self, id: UserId, update: UserUpdate) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&id) {
            return Err(StoreError::not_found("User"));
        }
        if let Some(constraint) =
            tables.conflicting_user(Some(id), update.username.as_deref(), update.email.as_deref())
        {
            return Err(StoreError::Duplicate(constraint.to_string()));
        }

        let user = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("User"))?;
        if let Some(username) = update.username {
            user.username = username;
        }
        if let Some(email) = update.email {
            user.email = email;
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }
}

#[async_trait]
impl PostStore for InMemoryStore {
    async fn create_post(&self, owner: UserId, content: PostContent) -> Result<Post, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&owner) {
            return Err(StoreError::not_found("User"));
        }

        tables.last_post_id += 1;
        let now = Utc::now();
        let post = Post {
            id: tables.last_post_id,
            title: content.title,
            content: content.content,
            published: content.published,
            draft: content.draft,
            user_id: owner,
            created_at: now,
            updated_at: now,
        };
        tables.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn get_post(&self, id: PostId) -> Result<Option<Post>, StoreError> {
        Ok(self.tables.read().await.posts.get(&id).cloned())
    }

    async fn list_posts(&self, query: &PostQuery) -> Result<Page<Post>, StoreError> {
        let tables = self.tables.read().await;
        let needle = query
            .search
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let mut matching: Vec<&Post> = tables
            .posts
            .values()
            .filter(|p| query.include_drafts || p.published)
            .filter(|p| {
                needle
                    .as_deref()
                    .map_or(true, |n| p.title.to_lowercase().contains(n))
            })
            .filter(|p| query.user_id.map_or(true, |uid| p.user_id == uid))
            .collect();

        matching.sort_by_key(|p| (p.created_at, p.id));
        if query.sort == SortOrder::Desc {
            matching.reverse();
        }

        let total = matching.len() as i64;
        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let items = matching
            .into_iter()
            .skip(offset)
            .take(query.limit as usize)
            .cloned()
            .collect();

        Ok(Page {
            items,
            total,
            page: query.page,
            limit: query.limit,
        })
    }

    async fn update_post(&self, id: PostId, content: PostContent) -> Result<Post, StoreError> {
        let mut tables = self.tables.write().await;
        let post = tables
            .posts
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("Post"))?;

        post.title = content.title;
        post.content = content.content;
        post.published = content.published;
        post.draft = content.draft;
        post.updated_at = Utc::now();
        Ok(post.clone())
    }

    async fn delete_post(&self, id: PostId) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.posts.remove(&id).is_none() {
            return Err(StoreError::not_found("Post"));
        }
        tables.comments.retain(|_, c| c.post_id != id);
        Ok(())
    }
}

#[async_trait]
impl CommentStore for InMemoryStore {
    async fn create_comment(&self, comment: NewComment) -> Result<Comment, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.posts.contains_key(&comment.post_id) {
            return Err(StoreError::not_found("Post"));
        }

        tables.last_comment_id += 1;
        let now = Utc::now();
        let created = Comment {
            id: tables.last_comment_id,
            content: comment.content,
            post_id: comment.post_id,
            user_id: comment.user_id,
            created_at: now,
            updated_at: now,
        };
        tables.comments.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_comment(&self, id: CommentId) -> Result<Option<Comment>, StoreError> {
        Ok(self.tables.read().await.comments.get(&id).cloned())
    }

    async fn list_comments(&self) -> Result<Vec<Comment>, StoreError> {
        Ok(self.tables.read().await.comments.values().cloned().collect())
    }

    async fn list_comments_for_post(
        &self,
        post_id: PostId,
    ) -> Result<Vec<CommentWithAuthor>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .filter_map(|c| {
                tables.users.get(&c.user_id).map(|u| CommentWithAuthor {
                    id: c.id,
                    content: c.content.clone(),
                    post_id: c.post_id,
                    user_id: c.user_id,
                    username: u.username.clone(),
                    created_at: c.created_at,
                    updated_at: c.updated_at,
                })
            })
            .collect())
    }

    async fn count_comments_for_post(&self, post_id: PostId) -> Result<i64, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.comments.values().filter(|c| c.post_id == post_id).count() as i64)
    }

    async fn update_comment(&self, id: CommentId, content: String) -> Result<Comment, StoreError> {
        let mut tables = self.tables.write().await;
        let comment = tables
            .comments
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("Comment"))?;

        comment.content = content;
        comment.updated_at = Utc::now();
        Ok(comment.clone())
    }

    async fn delete_comment(&self, id: CommentId) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        match tables.comments.remove(&id) {
            Some(_) => Ok(()),
            None => Err(StoreError::not_found("Comment")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "$argon2id$placeholder".to_string(),
        }
    }

    fn content(title: &str, published: bool) -> PostContent {
        PostContent::new(title.to_string(), "body".to_string(), published, !published)
    }

    #[tokio::test]
    async fn test_user_uniqueness() {
        let store = InMemoryStore::new();
        let alice = store.create_user(new_user("alice", "a@x.com")).await.unwrap();
        assert_eq!(alice.id, 1);

        let same_email = store.create_user(new_user("other", "a@x.com")).await;
        assert!(matches!(same_email, Err(StoreError::Duplicate(c)) if c == "users_email_key"));

        let same_name = store.create_user(new_user("alice", "b@x.com")).await;
        assert!(matches!(same_name, Err(StoreError::Duplicate(c)) if c == "users_username_key"));

        let found = store.find_by_username_or_email("nobody", "a@x.com").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(alice.id));
    }

    #[tokio::test]
    async fn test_update_user_checks_other_users_only() {
        let store = InMemoryStore::new();
        let alice = store.create_user(new_user("alice", "a@x.com")).await.unwrap();
        store.create_user(new_user("bob", "b@x.com")).await.unwrap();

        // Re-submitting one's own values is not a conflict
        let same = store
            .update_user(
                alice.id,
                UserUpdate {
                    username: Some("alice".to_string()),
                    email: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(same.username, "alice");

        let taken = store
            .update_user(
                alice.id,
                UserUpdate {
                    username: None,
                    email: Some("b@x.com".to_string()),
                },
            )
            .await;
        assert!(matches!(taken, Err(StoreError::Duplicate(_))));

        let missing = store.update_user(99, UserUpdate::default()).await;
        assert!(matches!(missing, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_posts_filters_and_pages() {
        let store = InMemoryStore::new();
        let alice = store.create_user(new_user("alice", "a@x.com")).await.unwrap();
        let bob = store.create_user(new_user("bob", "b@x.com")).await.unwrap();

        store.create_post(alice.id, content("Rust ownership", true)).await.unwrap();
        store.create_post(alice.id, content("Draft notes", false)).await.unwrap();
        store.create_post(bob.id, content("Learning rust", true)).await.unwrap();

        let page = store.list_posts(&PostQuery::default()).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].title, "Learning rust");

        let query = PostQuery {
            sort: SortOrder::Asc,
            ..PostQuery::default()
        };
        let page = store.list_posts(&query).await.unwrap();
        assert_eq!(page.items[0].title, "Rust ownership");

        let query = PostQuery {
            include_drafts: true,
            user_id: Some(alice.id),
            ..PostQuery::default()
        };
        assert_eq!(store.list_posts(&query).await.unwrap().total, 2);

        let query = PostQuery {
            search: Some("RUST".to_string()),
            ..PostQuery::default()
        };
        assert_eq!(store.list_posts(&query).await.unwrap().total, 2);

        let query = PostQuery::default().with_paging(Some(2), Some(1));
        let page = store.list_posts(&query).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].title, "Rust ownership");
    }

    #[tokio::test]
    async fn test_comments_follow_their_post() {
        let store = InMemoryStore::new();
        let alice = store.create_user(new_user("alice", "a@x.com")).await.unwrap();
        let post = store.create_post(alice.id, content("Hello", true)).await.unwrap();

        let missing_post = store
            .create_comment(NewComment {
                content: "orphan".to_string(),
                post_id: 42,
                user_id: alice.id,
            })
            .await;
        assert!(matches!(missing_post, Err(StoreError::NotFound(r)) if r == "Post"));

        store
            .create_comment(NewComment {
                content: "first".to_string(),
                post_id: post.id,
                user_id: alice.id,
            })
            .await
            .unwrap();

        let with_author = store.list_comments_for_post(post.id).await.unwrap();
        assert_eq!(with_author.len(), 1);
        assert_eq!(with_author[0].username, "alice");
        assert_eq!(store.count_comments_for_post(post.id).await.unwrap(), 1);

        store.delete_post(post.id).await.unwrap();
        assert_eq!(store.count_comments_for_post(post.id).await.unwrap(), 0);
        assert!(store.get_post(post.id).await.unwrap().is_none());
        assert!(matches!(
            store.delete_post(post.id).await,
            Err(StoreError::NotFound(_))
        ));
    }
}
