//! Role claim extraction.
//!
//! Authentication happens upstream; the session layer forwards the caller's
//! role as a header or a cookie and this module only reads it back.

use axum::http::{HeaderMap, header::COOKIE};

use crate::config::AuthSettings;

pub trait RoleResolver: Send + Sync {
    /// Raw role claim carried by the request, if any.
    fn role_claim(&self, headers: &HeaderMap) -> Option<String>;
}

/// Reads the configured header first, then the configured cookie.
///
/// Values are trusted verbatim. The upstream session layer must strip any
/// client-supplied copy of the header and cookie before setting its own.
#[derive(Debug, Clone)]
pub struct HeaderCookieRoleResolver {
    header: String,
    cookie: String,
}

impl HeaderCookieRoleResolver {
    pub fn new(header: impl Into<String>, cookie: impl Into<String>) -> Self {
        Self {
            header: header.into().to_ascii_lowercase(),
            cookie: cookie.into(),
        }
    }
}

impl From<&AuthSettings> for HeaderCookieRoleResolver {
    fn from(settings: &AuthSettings) -> Self {
        Self::new(settings.role_header.as_str(), settings.role_cookie.as_str())
    }
}

impl RoleResolver for HeaderCookieRoleResolver {
    fn role_claim(&self, headers: &HeaderMap) -> Option<String> {
        let from_header = headers
            .get(self.header.as_str())
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty());
        if let Some(value) = from_header {
            return Some(value.to_string());
        }

        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|raw| raw.split(';'))
            .filter_map(|pair| pair.split_once('='))
            .find(|(name, _)| name.trim() == self.cookie)
            .map(|(_, value)| value.trim().trim_matches('"').to_string())
            .filter(|value| !value.is_empty())
    }
}
