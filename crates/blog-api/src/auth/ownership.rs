//! Ownership guard for mutating posts and comments
//!
//! Only the identity that created a resource may update or delete it. There
//! is no role hierarchy and no override. Reads never go through this guard.

use super::middleware::AuthenticatedUser;
use crate::audit::{audit_log, AuditEvent};
use crate::error::AppError;
use blog_core::Ownable;

/// Result of an ownership check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allowed,
    Forbidden,
}

/// Compare the resource owner with the caller by strict equality
pub fn check_ownership<R: Ownable + ?Sized>(resource: &R, user: &AuthenticatedUser) -> Access {
    if resource.owner_id() == user.user_id {
        Access::Allowed
    } else {
        Access::Forbidden
    }
}

/// Fail with 403 unless `user` owns `resource`
///
/// `kind` names the resource in the audit record and the error message.
pub fn ensure_owner<R: Ownable + ?Sized>(
    resource: &R,
    user: &AuthenticatedUser,
    kind: &str,
    id: i64,
) -> Result<(), AppError> {
    match check_ownership(resource, user) {
        Access::Allowed => Ok(()),
        Access::Forbidden => {
            audit_log(&AuditEvent::AccessDenied {
                user_id: user.user_id,
                owner_id: resource.owner_id(),
                resource: format!("{kind}:{id}"),
            });
            Err(AppError::Forbidden(format!("You can only modify your own {kind}")))
        }
    }
}
