use std::collections::BTreeSet;

use tracing::warn;

use crate::{error::AppError, users::User};

pub const MOVIES_READ: &str = "movies:read";
pub const MOVIES_WRITE: &str = "movies:write";

/// Permission codes known to the service.
pub const KNOWN_PERMISSIONS: [&str; 2] = [MOVIES_READ, MOVIES_WRITE];

/// Granted permission codes. Anything absent is denied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Permissions(BTreeSet<String>);

impl Permissions {
    pub fn includes(&self, code: &str) -> bool {
        self.0.contains(code)
    }
}

impl From<Vec<String>> for Permissions {
    fn from(codes: Vec<String>) -> Self {
        Self(codes.into_iter().collect())
    }
}

/// Who is making the request. Requests without credentials are `Anonymous`.
#[derive(Debug, Clone)]
pub enum Principal {
    Anonymous,
    User {
        user: User,
        permissions: Permissions,
    },
}

/// Gate a protected operation: authenticated, activated, then holding `code`.
pub fn require_permission<'a>(principal: &'a Principal, code: &str) -> Result<&'a User, AppError> {
    let Principal::User { user, permissions } = principal else {
        return Err(AppError::AuthenticationRequired);
    };
    if !user.activated {
        warn!(user_id = user.id, "inactive account denied");
        return Err(AppError::InactiveAccount);
    }
    if !permissions.includes(code) {
        warn!(user_id = user.id, permission = code, "permission denied");
        return Err(AppError::PermissionDenied);
    }
    Ok(user)
}
