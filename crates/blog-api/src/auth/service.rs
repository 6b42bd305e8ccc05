//! Authentication service layer
//!
//! Registration, login and profile management on top of a [`UserStore`].
//! Password hashing runs on the blocking thread pool.

use super::jwt::{JwtService, TOKEN_TTL_SECS};
use super::password::{hash_password_with_config, verify_password};
use crate::audit::{audit_log, AuditEvent, ClientInfo};
use crate::error::AppError;
use blog_core::{NewUser, PasswordConfig, StoreError, User, UserId, UserStore, UserUpdate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use utoipa::ToSchema;
use validator::Validate;

/// Verified against when the email is unknown, so both failure paths cost
/// one Argon2 verification
const DECOY_PASSWORD: &str = "decoy-password-for-unknown-accounts";

/// User registration request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 50, message = "username must be 1-50 characters"))]
    #[schema(example = "alice")]
    pub username: String,
    #[validate(email(message = "email must be a valid address"))]
    #[schema(example = "a@x.com")]
    pub email: String,
    #[validate(length(min = 6, max = 128, message = "password must be 6-128 characters"))]
    #[schema(example = "secret1")]
    pub password: String,
}

/// User login request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

/// Profile update; omitted fields are kept
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 50, message = "username must be 1-50 characters"))]
    pub username: Option<String>,
    #[validate(email(message = "email must be a valid address"))]
    pub email: Option<String>,
}

/// Public view of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserInfo {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Successful login
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    #[schema(example = "Bearer")]
    pub token_type: String,
    /// Seconds until the token expires
    #[schema(example = 86400)]
    pub expires_in: i64,
    pub user: UserInfo,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn normalize_username(username: &str) -> Result<String, AppError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AppError::BadRequest("username must not be blank".to_string()));
    }
    Ok(username.to_string())
}

/// Authentication service
pub struct AuthService {
    users: Arc<dyn UserStore>,
    jwt: JwtService,
    password_config: PasswordConfig,
    decoy_hash: OnceLock<String>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        jwt: JwtService,
        password_config: PasswordConfig,
    ) -> Self {
        Self {
            users,
            jwt,
            password_config,
            decoy_hash: OnceLock::new(),
        }
    }

    async fn hash(&self, password: String) -> Result<String, AppError> {
        let config = self.password_config.clone();
        tokio::task::spawn_blocking(move || hash_password_with_config(&password, &config))
            .await
            .map_err(|e| AppError::Internal(format!("Password hashing task failed: {e}")))?
            .map_err(|e| AppError::Internal(e.to_string()))
    }

    async fn verify(&self, password: String, hash: String) -> Result<bool, AppError> {
        tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| AppError::Internal(format!("Password verification task failed: {e}")))?
            .map_err(|e| AppError::Internal(e.to_string()))
    }

    async fn decoy_hash(&self) -> Result<String, AppError> {
        if let Some(hash) = self.decoy_hash.get() {
            return Ok(hash.clone());
        }
        let hash = self.hash(DECOY_PASSWORD.to_string()).await?;
        Ok(self.decoy_hash.get_or_init(|| hash).clone())
    }

    /// Register a new user
    ///
    /// Fails with 409 if the username or email is taken. The combined lookup
    /// only short-circuits the common case; a concurrent registration that
    /// slips past it is rejected by the store's unique constraints.
    pub async fn register(
        &self,
        request: RegisterRequest,
        client: &ClientInfo,
    ) -> Result<UserInfo, AppError> {
        let username = normalize_username(&request.username)?;
        let email = normalize_email(&request.email);

        let reject = |reason: String| {
            audit_log(&AuditEvent::RegistrationFailure {
                email: email.clone(),
                reason,
                ip_address: client.ip_address.clone(),
                user_agent: client.user_agent.clone(),
            });
        };

        if self
            .users
            .find_by_username_or_email(&username, &email)
            .await?
            .is_some()
        {
            reject("username or email already registered".to_string());
            return Err(AppError::Conflict(
                "Username or email already exists".to_string(),
            ));
        }

        let password_hash = self.hash(request.password).await?;

        let user = match self
            .users
            .create_user(NewUser {
                username,
                email: email.clone(),
                password_hash,
            })
            .await
        {
            Ok(user) => user,
            Err(e @ StoreError::Duplicate(_)) => {
                reject(e.to_string());
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };

        audit_log(&AuditEvent::RegistrationSuccess {
            user_id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
        });

        Ok(user.into())
    }

    /// Login with email and password
    ///
    /// Unknown email and wrong password produce the same 401.
    pub async fn login(
        &self,
        request: LoginRequest,
        client: &ClientInfo,
    ) -> Result<LoginResponse, AppError> {
        let email = normalize_email(&request.email);
        let fail = |reason: &str| {
            audit_log(&AuditEvent::LoginFailure {
                email: email.clone(),
                reason: reason.to_string(),
                ip_address: client.ip_address.clone(),
                user_agent: client.user_agent.clone(),
            });
            AppError::Unauthorized
        };

        let Some(user) = self.users.find_by_email(&email).await? else {
            let decoy = self.decoy_hash().await?;
            self.verify(request.password, decoy).await?;
            return Err(fail("unknown email"));
        };

        if !self
            .verify(request.password, user.password_hash.clone())
            .await?
        {
            return Err(fail("wrong password"));
        }

        let issued = self
            .jwt
            .issue(user.id)
            .map_err(|e| AppError::Internal(e.to_string()))?;

        audit_log(&AuditEvent::LoginSuccess {
            user_id: user.id,
            email: user.email.clone(),
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
        });

        Ok(LoginResponse {
            message: "Login successful".to_string(),
            token: issued.token,
            token_type: "Bearer".to_string(),
            expires_in: TOKEN_TTL_SECS,
            user: user.into(),
        })
    }

    /// Profile of the authenticated user
    pub async fn get_profile(&self, user_id: UserId) -> Result<UserInfo, AppError> {
        self.users
            .find_by_id(user_id)
            .await?
            .map(UserInfo::from)
            .ok_or_else(|| AppError::not_found("User"))
    }

    /// Change username and/or email
    pub async fn update_profile(
        &self,
        user_id: UserId,
        request: UpdateProfileRequest,
    ) -> Result<UserInfo, AppError> {
        let update = UserUpdate {
            username: request
                .username
                .as_deref()
                .map(normalize_username)
                .transpose()?,
            email: request.email.as_deref().map(normalize_email),
        };

        if update.is_empty() {
            return self.get_profile(user_id).await;
        }

        let user = self.users.update_user(user_id, update).await?;
        tracing::info!(user_id = user.id, "Profile updated");
        Ok(user.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use blog_core::InMemoryStore;
    use proptest::prelude::*;

    /// Store whose registration pre-check never sees existing users, as when
    /// a concurrent registration commits between the check and the insert
    struct StalePrecheckStore(InMemoryStore);

    #[async_trait]
    impl UserStore for StalePrecheckStore {
        async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
            self.0.create_user(user).await
        }

        async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
            self.0.find_by_id(id).await
        }

        async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
            self.0.find_by_email(email).await
        }

        async fn find_by_username_or_email(
            &self,
            _username: &str,
            _email: &str,
        ) -> Result<Option<User>, StoreError> {
            Ok(None)
        }

        async fn update_user(&self, id: UserId, update: UserUpdate) -> Result<User, StoreError> {
            self.0.update_user(id, update).await
        }
    }

    fn light_password_config() -> PasswordConfig {
        PasswordConfig {
            memory_cost: 4096,
            time_cost: 1,
            parallelism: 1,
        }
    }

    fn service() -> AuthService {
        AuthService::new(
            Arc::new(InMemoryStore::new()),
            JwtService::new("service-test-secret", "blog-api"),
            light_password_config(),
        )
    }

    fn register_request(username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    fn login_request(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_request_validation() {
        assert!(register_request("alice", "a@x.com", "secret1").validate().is_ok());
        assert!(register_request("", "a@x.com", "secret1").validate().is_err());
        assert!(register_request("alice", "not-an-email", "secret1").validate().is_err());
        assert!(register_request("alice", "a@x.com", "short").validate().is_err());

        assert!(UpdateProfileRequest::default().validate().is_ok());
        let bad = UpdateProfileRequest {
            email: Some("nope".to_string()),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let auth = service();
        let client = ClientInfo::default();

        let user = auth
            .register(register_request("alice", "A@X.com", "secret1"), &client)
            .await
            .unwrap();
        assert_eq!(user.email, "a@x.com");

        let response = auth
            .login(login_request("a@x.com", "secret1"), &client)
            .await
            .unwrap();
        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.expires_in, 86_400);
        assert_eq!(response.user.id, user.id);

        let verified = auth.jwt.verify(&response.token).unwrap();
        assert_eq!(verified.user_id, user.id);
    }

    #[tokio::test]
    async fn test_duplicate_registration() {
        let auth = service();
        let client = ClientInfo::default();
        auth.register(register_request("alice", "a@x.com", "secret1"), &client)
            .await
            .unwrap();

        let same_email = auth
            .register(register_request("someone", "a@x.com", "secret2"), &client)
            .await;
        assert!(matches!(same_email, Err(AppError::Conflict(_))));

        let same_username = auth
            .register(register_request("alice", "b@x.com", "secret2"), &client)
            .await;
        assert!(matches!(same_username, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_unique_constraint_rejects_what_precheck_missed() {
        let auth = AuthService::new(
            Arc::new(StalePrecheckStore(InMemoryStore::new())),
            JwtService::new("service-test-secret", "blog-api"),
            light_password_config(),
        );
        let client = ClientInfo::default();
        auth.register(register_request("alice", "a@x.com", "secret1"), &client)
            .await
            .unwrap();

        let same_email = auth
            .register(register_request("someone", "a@x.com", "secret2"), &client)
            .await;
        match same_email {
            Err(AppError::Conflict(message)) => assert_eq!(message, "Email already exists"),
            other => panic!("expected conflict, got {other:?}"),
        }

        let same_username = auth
            .register(register_request("alice", "b@x.com", "secret2"), &client)
            .await;
        match same_username {
            Err(AppError::Conflict(message)) => assert_eq!(message, "Username already exists"),
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_registrations_with_one_email() {
        let auth = Arc::new(service());
        let client = ClientInfo::default();

        let (first, second) = tokio::join!(
            auth.register(register_request("first", "same@x.com", "secret1"), &client),
            auth.register(register_request("second", "same@x.com", "secret1"), &client),
        );

        let conflicts = [&first, &second]
            .iter()
            .filter(|result| matches!(result, Err(AppError::Conflict(_))))
            .count();
        assert!(first.is_ok() || second.is_ok());
        assert_eq!(conflicts, 1);
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let auth = service();
        let client = ClientInfo::default();
        auth.register(register_request("alice", "a@x.com", "secret1"), &client)
            .await
            .unwrap();

        let wrong_password = auth.login(login_request("a@x.com", "wrong!"), &client).await;
        let unknown_email = auth.login(login_request("b@x.com", "secret1"), &client).await;

        assert!(matches!(wrong_password, Err(AppError::Unauthorized)));
        assert!(matches!(unknown_email, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_update_profile() {
        let auth = service();
        let client = ClientInfo::default();
        let alice = auth
            .register(register_request("alice", "a@x.com", "secret1"), &client)
            .await
            .unwrap();
        auth.register(register_request("bob", "b@x.com", "secret1"), &client)
            .await
            .unwrap();

        let unchanged = auth
            .update_profile(alice.id, UpdateProfileRequest::default())
            .await
            .unwrap();
        assert_eq!(unchanged.username, "alice");

        let renamed = auth
            .update_profile(
                alice.id,
                UpdateProfileRequest {
                    username: Some(" alicia ".to_string()),
                    email: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.username, "alicia");

        let taken = auth
            .update_profile(
                alice.id,
                UpdateProfileRequest {
                    username: None,
                    email: Some("B@x.com".to_string()),
                },
            )
            .await;
        assert!(matches!(taken, Err(AppError::Conflict(_))));

        assert!(matches!(
            auth.get_profile(999).await,
            Err(AppError::NotFound(_))
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn registered_credentials_always_log_in(
            username in "[a-z][a-z0-9]{2,15}",
            password in "[A-Za-z0-9!@#]{6,24}",
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async {
                let auth = service();
                let client = ClientInfo::default();
                let email = format!("{username}@example.com");

                let user = auth
                    .register(register_request(&username, &email, &password), &client)
                    .await
                    .unwrap();
                let response = auth
                    .login(login_request(&email, &password), &client)
                    .await
                    .unwrap();

                assert_eq!(auth.jwt.verify(&response.token).unwrap().user_id, user.id);
            });
        }
    }
}
