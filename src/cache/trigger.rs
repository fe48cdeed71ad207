//! Cache trigger service.
//!
//! Called by every menu write after it has been committed. The purge is awaited
//! so the same instance never serves the pre-mutation menu afterwards.

use std::sync::Arc;

use tracing::warn;

use super::keys::MENU_NAMESPACE;
use super::tiered::{InvalidationReport, PatternInvalidation};

#[derive(Clone)]
pub struct CacheTrigger {
    target: Arc<dyn PatternInvalidation>,
}

impl CacheTrigger {
    pub fn new(target: Arc<dyn PatternInvalidation>) -> Self {
        Self { target }
    }

    /// Purge every role-scoped menu entry.
    ///
    /// A failed shared-tier purge is logged and otherwise ignored: the write
    /// that caused it already succeeded.
    pub async fn menu_mutated(&self) -> InvalidationReport {
        let report = self.target.invalidate(MENU_NAMESPACE).await;
        if report.is_partial_failure() {
            warn!(
                target = "atrium::cache::trigger",
                local_removed = report.local_removed,
                "menu invalidation reached L1 only; other instances stay stale until TTL expiry"
            );
        }
        report
    }
}
