//! Shared domain enumerations aligned with persisted database enums.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Access tier attached to a menu entry. Ordering is meaningful:
/// `Guest < User < Admin`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "menu_visibility", rename_all = "snake_case")]
pub enum VisibilityLevel {
    Guest,
    User,
    Admin,
}

impl VisibilityLevel {
    /// Every level, least privileged first.
    pub const ALL: [VisibilityLevel; 3] = [
        VisibilityLevel::Guest,
        VisibilityLevel::User,
        VisibilityLevel::Admin,
    ];
}

/// Caller role as resolved from the session layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Guest,
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Guest => "guest",
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    /// Highest visibility level this role may see.
    pub fn max_level(self) -> VisibilityLevel {
        match self {
            Role::Guest => VisibilityLevel::Guest,
            Role::User => VisibilityLevel::User,
            Role::Admin => VisibilityLevel::Admin,
        }
    }

    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl TryFrom<&str> for Role {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "guest" => Ok(Role::Guest),
            "user" | "member" => Ok(Role::User),
            "admin" | "administrator" => Ok(Role::Admin),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
