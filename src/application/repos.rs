//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::{MenuEntry, SubMenuEntry};
use crate::domain::types::VisibilityLevel;

const DEFAULT_MAX_ENTRIES: u32 = 20;
const DEFAULT_MAX_CHILDREN: u32 = 10;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Row caps applied by the source adapter. `None` means uncapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuLimits {
    pub entries: Option<u32>,
    pub children_per_entry: Option<u32>,
}

impl Default for MenuLimits {
    fn default() -> Self {
        Self {
            entries: Some(DEFAULT_MAX_ENTRIES),
            children_per_entry: Some(DEFAULT_MAX_CHILDREN),
        }
    }
}

impl MenuLimits {
    pub fn unbounded() -> Self {
        Self {
            entries: None,
            children_per_entry: None,
        }
    }
}

/// Read side of menu persistence.
#[async_trait]
pub trait MenuRepo: Send + Sync {
    /// Active entries whose visibility is in `levels`, each carrying its active
    /// sub-entries filtered by the same levels. Ordered by display order, then id.
    async fn fetch_menus(
        &self,
        levels: &[VisibilityLevel],
        limits: MenuLimits,
    ) -> Result<Vec<MenuEntry>, RepoError>;

    /// Every entry and sub-entry regardless of visibility or active flag.
    async fn list_all_menus(&self) -> Result<Vec<MenuEntry>, RepoError>;

    async fn health_check(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CreateMenuParams {
    pub label: String,
    pub path: String,
    pub display_order: i32,
    pub visibility: VisibilityLevel,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct UpdateMenuParams {
    pub id: Uuid,
    pub label: String,
    pub path: String,
    pub display_order: i32,
    pub visibility: VisibilityLevel,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct CreateSubMenuParams {
    pub menu_id: Uuid,
    pub label: String,
    pub path: String,
    pub display_order: i32,
    pub visibility: VisibilityLevel,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct UpdateSubMenuParams {
    pub id: Uuid,
    pub label: String,
    pub path: String,
    pub display_order: i32,
    pub visibility: VisibilityLevel,
    pub active: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct MenuOrderParams {
    pub id: Uuid,
    pub display_order: i32,
}

/// Write side of menu persistence. Returned entries carry no children.
#[async_trait]
pub trait MenuWriteRepo: Send + Sync {
    async fn create_menu(&self, params: CreateMenuParams) -> Result<MenuEntry, RepoError>;

    async fn update_menu(&self, params: UpdateMenuParams) -> Result<MenuEntry, RepoError>;

    async fn delete_menu(&self, id: Uuid) -> Result<(), RepoError>;

    async fn reorder_menus(&self, order: &[MenuOrderParams]) -> Result<(), RepoError>;

    async fn create_sub_menu(&self, params: CreateSubMenuParams)
    -> Result<SubMenuEntry, RepoError>;

    async fn update_sub_menu(&self, params: UpdateSubMenuParams)
    -> Result<SubMenuEntry, RepoError>;

    async fn delete_sub_menu(&self, id: Uuid) -> Result<(), RepoError>;
}
