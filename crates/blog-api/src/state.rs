//! Application state management
//!
//! Author: hephaex@gmail.com

use crate::auth::{AuthService, JwtService};
use blog_core::{AppConfig, CommentStore, PostStore, UserStore};
use std::sync::Arc;
use std::time::Instant;

/// Application state shared across handlers
///
/// Everything in here is immutable after startup; the stores hold their own
/// connection pool or lock.
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Token issuer/verifier, keyed by the configured secret
    pub jwt: JwtService,
    /// Registration, login and profile logic
    pub auth: AuthService,
    pub users: Arc<dyn UserStore>,
    pub posts: Arc<dyn PostStore>,
    pub comments: Arc<dyn CommentStore>,
    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    /// Build the state around a store implementing every resource trait
    pub fn new<S>(config: AppConfig, store: Arc<S>) -> Self
    where
        S: UserStore + PostStore + CommentStore + 'static,
    {
        let jwt = JwtService::new(&config.auth.jwt_secret, config.auth.issuer.clone());
        let users: Arc<dyn UserStore> = store.clone();
        let auth = AuthService::new(users.clone(), jwt.clone(), config.auth.password.clone());

        Self {
            config,
            jwt,
            auth,
            users,
            posts: store.clone(),
            comments: store,
            start_time: Instant::now(),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
