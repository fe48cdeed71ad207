//! Cache key definitions.

use std::fmt;

use crate::domain::types::Role;

/// Namespace shared by every menu cache key; also the invalidation pattern.
pub const MENU_NAMESPACE: &str = "menu";

/// Canonical string key used in both tiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// `menu:<role>`.
    ///
    /// Keyed by role name rather than by level set, so two roles that share a
    /// level set are cached twice.
    pub fn for_role(role: Role) -> Self {
        Self::scoped(MENU_NAMESPACE, role.as_str())
    }

    pub fn scoped(namespace: &str, discriminator: &str) -> Self {
        Self(format!("{namespace}:{discriminator}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_keys_live_in_menu_namespace() {
        assert_eq!(CacheKey::for_role(Role::Guest).as_str(), "menu:guest");
        assert_eq!(CacheKey::for_role(Role::Admin).as_str(), "menu:admin");
        assert!(CacheKey::for_role(Role::User).as_str().starts_with(MENU_NAMESPACE));
    }

    #[test]
    fn roles_produce_distinct_keys() {
        assert_ne!(CacheKey::for_role(Role::Guest), CacheKey::for_role(Role::User));
        assert_ne!(CacheKey::for_role(Role::User), CacheKey::for_role(Role::Admin));
    }

    #[test]
    fn foreign_namespaces_do_not_match() {
        let key = CacheKey::scoped("settings", "site");
        assert!(!key.as_str().contains(MENU_NAMESPACE));
    }
}
