use serde::{Deserialize, Serialize};
use std::fmt;

/// Roles a user may hold. `Franchisee` is scoped to a franchise via
/// [`RoleAssignment::object_id`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Diner,
    Franchisee,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Diner => "diner",
            Role::Franchisee => "franchisee",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Role::Admin),
            "diner" => Some(Role::Diner),
            "franchisee" => Some(Role::Franchisee),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a user's role set, e.g. `{role: franchisee, objectId: 3}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub role: Role,
    #[serde(rename = "objectId", skip_serializing_if = "Option::is_none")]
    pub object_id: Option<i64>,
}

impl RoleAssignment {
    pub fn global(role: Role) -> Self {
        Self {
            role,
            object_id: None,
        }
    }

    pub fn scoped(role: Role, object_id: i64) -> Self {
        Self {
            role,
            object_id: Some(object_id),
        }
    }
}
