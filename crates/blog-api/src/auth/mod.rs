//! Authentication and authorization module
//!
//! - Password hashing with Argon2id
//! - JWT token issuance and verification
//! - Middleware binding the caller's identity to the request
//! - Ownership guard for mutations
//! - Authentication service for registration, login and profiles

pub mod jwt;
pub mod middleware;
pub mod ownership;
pub mod password;
pub mod service;

pub use jwt::{Claims, IssuedToken, JwtError, JwtService, VerifiedToken, TOKEN_TTL_SECS};
pub use middleware::{auth_middleware, parse_bearer, AuthError, AuthenticatedUser};
pub use ownership::{check_ownership, ensure_owner, Access};
pub use password::{hash_password_with_config, verify_password, PasswordError};
pub use service::{
    AuthService, LoginRequest, LoginResponse, RegisterRequest, UpdateProfileRequest, UserInfo,
};
