//! Authentication middleware for protecting routes
//!
//! Extracts and verifies the bearer token from the Authorization header.
//! On success, the caller's identity is added to request extensions as an
//! [`AuthenticatedUser`]; on any failure the request is answered with a
//! generic 401 and no handler runs.

use super::jwt::JwtError;
use crate::audit::{audit_log, AuditEvent, ClientInfo};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use blog_core::UserId;
use std::sync::Arc;
use thiserror::Error;

/// Identity of the caller, bound by [`auth_middleware`]
///
/// Handlers take it as an extractor. It is only present behind the
/// middleware; extracting it elsewhere yields 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .copied()
            .ok_or(AppError::Unauthorized)
    }
}

/// Authentication middleware errors
///
/// The variants only feed the audit log. Every one maps to the same 401
/// body.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingAuthHeader,

    #[error("Invalid Authorization header format")]
    InvalidAuthHeader,

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] JwtError),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        AppError::Unauthorized.into_response()
    }
}

/// Split `Authorization: Bearer <token>`; the scheme is case-insensitive
pub fn parse_bearer(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

fn authenticate(state: &AppState, request: &Request) -> Result<AuthenticatedUser, AuthError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    let token = parse_bearer(auth_header).ok_or(AuthError::InvalidAuthHeader)?;
    let verified = state.jwt.verify(token)?;

    Ok(AuthenticatedUser {
        user_id: verified.user_id,
    })
}

/// Authentication middleware that requires a valid bearer token
///
/// ```ignore
/// let protected = Router::new()
///     .route("/api/posts", post(posts::create_post))
///     .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));
/// ```
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    match authenticate(&state, &request) {
        Ok(user) => {
            tracing::debug!(user_id = user.user_id, "Request authenticated");
            request.extensions_mut().insert(user);
            Ok(next.run(request).await)
        }
        Err(e) => {
            let client = ClientInfo::from_request(
                request.headers(),
                request.extensions(),
                &state.config.server.trusted_proxies,
            );
            audit_log(&AuditEvent::InvalidToken {
                reason: e.to_string(),
                ip_address: client.ip_address,
                user_agent: client.user_agent,
            });
            Err(e)
        }
    }
}
