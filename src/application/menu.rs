//! Role-aware menu resolution backed by the tiered cache.

use std::sync::Arc;
use std::time::Instant;

use metrics::histogram;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::repos::{MenuLimits, MenuRepo, RepoError};
use crate::cache::{CacheKey, CacheTier, TieredCache};
use crate::domain::access::{AccessibleLevels, RoleClassification, accessible_levels, classify_role};
use crate::domain::entities::{MenuEntry, SubMenuEntry};
use crate::domain::types::Role;

const METRIC_RESOLVE_MS: &str = "atrium_menu_resolve_ms";

/// The cached payload: a menu together with the access metadata it was
/// computed for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuSnapshot {
    pub entries: Vec<MenuEntry>,
    pub role: Role,
    pub accessible_levels: AccessibleLevels,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
    L1,
    L2,
    Source,
}

impl ServedFrom {
    pub fn is_cached(self) -> bool {
        !matches!(self, ServedFrom::Source)
    }

    /// `"L1"` / `"L2"` for cached results, `None` when the source was hit.
    pub fn cache_source(self) -> Option<&'static str> {
        match self {
            ServedFrom::L1 => Some(CacheTier::L1.as_str()),
            ServedFrom::L2 => Some(CacheTier::L2.as_str()),
            ServedFrom::Source => None,
        }
    }
}

impl From<CacheTier> for ServedFrom {
    fn from(tier: CacheTier) -> Self {
        match tier {
            CacheTier::L1 => ServedFrom::L1,
            CacheTier::L2 => ServedFrom::L2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedMenu {
    pub snapshot: Arc<MenuSnapshot>,
    pub served_from: ServedFrom,
}

#[derive(Debug, Clone)]
pub struct ResolvedChildren {
    pub menu: ResolvedMenu,
    pub parent_id: Uuid,
    pub children: Vec<SubMenuEntry>,
}

#[derive(Debug, Error)]
pub enum MenuResolutionError {
    #[error("menu source unavailable")]
    ResolutionFailed(#[source] RepoError),
    #[error("menu entry `{0}` is not visible to this caller")]
    UnknownEntry(Uuid),
}

#[derive(Clone)]
pub struct MenuResolutionService {
    source: Arc<dyn MenuRepo>,
    cache: Arc<TieredCache<MenuSnapshot>>,
    limits: MenuLimits,
}

impl MenuResolutionService {
    pub fn new(
        source: Arc<dyn MenuRepo>,
        cache: Arc<TieredCache<MenuSnapshot>>,
        limits: MenuLimits,
    ) -> Self {
        Self {
            source,
            cache,
            limits,
        }
    }

    pub fn cache(&self) -> &Arc<TieredCache<MenuSnapshot>> {
        &self.cache
    }

    /// Menu visible to the caller described by `claim`.
    ///
    /// Cache failures never surface here; only a source failure on a miss
    /// does.
    pub async fn resolve(&self, claim: Option<&str>) -> Result<ResolvedMenu, MenuResolutionError> {
        let started_at = Instant::now();
        let role = effective_role(claim);
        let levels = accessible_levels(role);
        let key = CacheKey::for_role(role);

        if let Some(hit) = self.cache.get(&key).await {
            if hit.value.accessible_levels == levels {
                record_latency(started_at);
                return Ok(ResolvedMenu {
                    snapshot: hit.value,
                    served_from: hit.tier.into(),
                });
            }
            warn!(
                target = "atrium::application::menu",
                key = %key,
                tier = hit.tier.as_str(),
                "cached menu carries foreign access levels; refetching"
            );
        }

        let entries = self
            .source
            .fetch_menus(levels.as_slice(), self.limits)
            .await
            .map_err(|err| {
                warn!(
                    target = "atrium::application::menu",
                    role = role.as_str(),
                    error = %err,
                    "menu source unavailable on cache miss"
                );
                MenuResolutionError::ResolutionFailed(err)
            })?;

        let snapshot = Arc::new(MenuSnapshot {
            entries,
            role,
            accessible_levels: levels,
        });
        self.cache.set(&key, Arc::clone(&snapshot)).await;
        record_latency(started_at);

        Ok(ResolvedMenu {
            snapshot,
            served_from: ServedFrom::Source,
        })
    }

    /// Children of one top-level entry, taken from the caller's resolved menu.
    pub async fn resolve_children(
        &self,
        claim: Option<&str>,
        parent_id: Uuid,
    ) -> Result<ResolvedChildren, MenuResolutionError> {
        let menu = self.resolve(claim).await?;
        let children = menu
            .snapshot
            .entries
            .iter()
            .find(|entry| entry.id == parent_id)
            .map(|entry| entry.children.clone())
            .ok_or(MenuResolutionError::UnknownEntry(parent_id))?;

        Ok(ResolvedChildren {
            menu,
            parent_id,
            children,
        })
    }
}

/// Role a claim resolves to, logging anonymous and unrecognised claims.
pub fn effective_role(claim: Option<&str>) -> Role {
    let classification = classify_role(claim);
    match &classification {
        RoleClassification::Known(_) => {}
        RoleClassification::Anonymous => {
            debug!(
                target = "atrium::application::menu",
                "no role claim; resolving as guest"
            );
        }
        RoleClassification::Unknown(raw) => {
            warn!(
                target = "atrium::application::menu",
                claim = %raw,
                "unknown role claim; resolving as guest"
            );
        }
    }
    classification.role()
}

fn record_latency(started_at: Instant) {
    histogram!(METRIC_RESOLVE_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
}
