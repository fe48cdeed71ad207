//! Domain entities mirrored from persistent storage.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::error::DomainError;
use super::types::VisibilityLevel;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuEntry {
    pub id: Uuid,
    pub label: String,
    pub path: String,
    pub display_order: i32,
    pub visibility: VisibilityLevel,
    pub active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub children: Vec<SubMenuEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubMenuEntry {
    pub id: Uuid,
    pub menu_id: Uuid,
    pub label: String,
    pub path: String,
    pub display_order: i32,
    pub visibility: VisibilityLevel,
    pub active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Trimmed, non-empty display label.
pub fn normalize_label(raw: &str) -> Result<String, DomainError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("label must not be empty"));
    }
    Ok(trimmed.to_string())
}

/// Site-relative (`/…`) or absolute http(s) target path.
pub fn normalize_path(raw: &str) -> Result<String, DomainError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("path must not be empty"));
    }
    let accepted = trimmed.starts_with('/')
        || trimmed.starts_with("https://")
        || trimmed.starts_with("http://");
    if !accepted {
        return Err(DomainError::validation(
            "path must start with `/`, `http://` or `https://`",
        ));
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(DomainError::validation("path must not contain whitespace"));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_trimmed() {
        assert_eq!(normalize_label("  Blog ").expect("valid"), "Blog");
        assert!(normalize_label("   ").is_err());
    }

    #[test]
    fn paths_must_be_rooted_or_absolute() {
        assert_eq!(normalize_path(" /blog ").expect("valid"), "/blog");
        assert!(normalize_path("https://example.com/docs").is_ok());
        assert!(normalize_path("blog").is_err());
        assert!(normalize_path("/a b").is_err());
        assert!(normalize_path("").is_err());
    }

    #[test]
    fn entries_serialize_camel_case() {
        let entry = SubMenuEntry {
            id: Uuid::nil(),
            menu_id: Uuid::nil(),
            label: "Docs".to_string(),
            path: "/docs".to_string(),
            display_order: 1,
            visibility: VisibilityLevel::User,
            active: true,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        };
        let value = serde_json::to_value(&entry).expect("serialize");
        assert_eq!(value["displayOrder"], 1);
        assert_eq!(value["menuId"], Uuid::nil().to_string());
        assert_eq!(value["visibility"], "user");
        assert_eq!(value["updatedAt"], "1970-01-01T00:00:00Z");
    }
}
