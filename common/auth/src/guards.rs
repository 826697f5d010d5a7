use axum::http::StatusCode;
use common_http_errors::ApiError;

use crate::roles::{Role, RoleAssignment};

/// Allow/deny decisions over a user's freshly loaded role set. Pure functions:
/// no dynamic dispatch, no shared state (credential presence is checked
/// upstream and yields 401, never 403).
#[derive(Debug, Clone)]
pub enum GuardError {
    Forbidden { required: Vec<String> },
}

impl GuardError {
    fn forbidden(required: &[&str]) -> Self {
        GuardError::Forbidden {
            required: required.iter().map(|value| value.to_string()).collect(),
        }
    }

    pub fn into_response(self) -> (StatusCode, String) {
        match self {
            GuardError::Forbidden { required } => (
                StatusCode::FORBIDDEN,
                if required.is_empty() {
                    "unauthorized".to_string()
                } else {
                    format!("Insufficient role. Required one of: {}", required.join(", "))
                },
            ),
        }
    }
}

impl From<GuardError> for (StatusCode, String) {
    fn from(value: GuardError) -> Self {
        value.into_response()
    }
}

impl From<GuardError> for ApiError {
    fn from(value: GuardError) -> Self {
        match value {
            GuardError::Forbidden { required } => ApiError::Forbidden {
                required: if required.is_empty() {
                    None
                } else {
                    Some(required.join(", "))
                },
            },
        }
    }
}

fn holds(roles: &[RoleAssignment], role: Role) -> bool {
    roles.iter().any(|assignment| assignment.role == role)
}

/// The `admin` role satisfies any requirement.
pub fn ensure_admin(roles: &[RoleAssignment]) -> Result<(), GuardError> {
    if holds(roles, Role::Admin) {
        Ok(())
    } else {
        Err(GuardError::forbidden(&["admin"]))
    }
}

/// Identity-scoped requirement: a caller may act on their own record without
/// an elevated role; anyone else needs `admin`.
pub fn ensure_self_or_admin(
    roles: &[RoleAssignment],
    caller_id: i64,
    target_id: i64,
) -> Result<(), GuardError> {
    if caller_id == target_id || holds(roles, Role::Admin) {
        Ok(())
    } else {
        Err(GuardError::forbidden(&["admin"]))
    }
}

/// Franchise-scoped requirement: global `admin`, or `franchisee` bound to this
/// franchise, may mutate the franchise and its stores.
pub fn ensure_franchise_admin(
    roles: &[RoleAssignment],
    franchise_id: i64,
) -> Result<(), GuardError> {
    let owns_franchise = roles.iter().any(|assignment| {
        assignment.role == Role::Franchisee && assignment.object_id == Some(franchise_id)
    });

    if holds(roles, Role::Admin) || owns_franchise {
        Ok(())
    } else {
        Err(GuardError::forbidden(&["admin", "franchisee"]))
    }
}
