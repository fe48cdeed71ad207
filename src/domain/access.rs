//! Role → visibility policy.
//!
//! Pure functions only. Unknown or missing roles collapse to guest access.

use serde::{Deserialize, Serialize};

use super::types::{Role, VisibilityLevel};

/// Ordered, non-empty set of visibility levels a caller may see.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessibleLevels(Vec<VisibilityLevel>);

impl AccessibleLevels {
    pub fn as_slice(&self) -> &[VisibilityLevel] {
        &self.0
    }
}

/// Outcome of interpreting a raw role claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleClassification {
    Known(Role),
    /// No claim present; an anonymous visitor.
    Anonymous,
    /// A claim was present but did not name a known role.
    Unknown(String),
}

impl RoleClassification {
    /// Effective role; anything unrecognised is treated as a guest.
    pub fn role(&self) -> Role {
        match self {
            RoleClassification::Known(role) => *role,
            RoleClassification::Anonymous | RoleClassification::Unknown(_) => Role::Guest,
        }
    }
}

pub fn classify_role(raw: Option<&str>) -> RoleClassification {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => RoleClassification::Anonymous,
        Some(value) => match Role::try_from(value) {
            Ok(role) => RoleClassification::Known(role),
            Err(()) => RoleClassification::Unknown(value.to_string()),
        },
    }
}

/// Levels visible to `role`: every level up to and including its maximum.
pub fn accessible_levels(role: Role) -> AccessibleLevels {
    let max = role.max_level();
    AccessibleLevels(
        VisibilityLevel::ALL
            .into_iter()
            .filter(|level| *level <= max)
            .collect(),
    )
}
