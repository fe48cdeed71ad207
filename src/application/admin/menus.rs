use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::application::repos::{
    CreateMenuParams, CreateSubMenuParams, MenuOrderParams, MenuRepo, MenuWriteRepo, RepoError,
    UpdateMenuParams, UpdateSubMenuParams,
};
use crate::cache::CacheTrigger;
use crate::domain::entities::{MenuEntry, SubMenuEntry, normalize_label, normalize_path};
use crate::domain::error::DomainError;
use crate::domain::types::VisibilityLevel;

#[derive(Debug, Error)]
pub enum AdminMenuError {
    #[error("{0}")]
    ConstraintViolation(String),
    #[error("menu item not found")]
    NotFound,
    #[error(transparent)]
    Repo(RepoError),
}

impl From<RepoError> for AdminMenuError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => AdminMenuError::NotFound,
            RepoError::InvalidInput { message } => AdminMenuError::ConstraintViolation(message),
            other => AdminMenuError::Repo(other),
        }
    }
}

impl From<DomainError> for AdminMenuError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation { message } => AdminMenuError::ConstraintViolation(message),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MenuItemCommand {
    pub label: String,
    pub path: String,
    pub display_order: i32,
    pub visibility: VisibilityLevel,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct ReorderCommand {
    pub order: Vec<MenuOrderParams>,
}

/// Menu administration. Every successful write purges the menu cache before
/// returning.
#[derive(Clone)]
pub struct AdminMenuService {
    reader: Arc<dyn MenuRepo>,
    writer: Arc<dyn MenuWriteRepo>,
    cache_trigger: CacheTrigger,
}

impl AdminMenuService {
    pub fn new(
        reader: Arc<dyn MenuRepo>,
        writer: Arc<dyn MenuWriteRepo>,
        cache_trigger: CacheTrigger,
    ) -> Self {
        Self {
            reader,
            writer,
            cache_trigger,
        }
    }

    /// Every entry, including inactive ones, with all children.
    pub async fn list(&self) -> Result<Vec<MenuEntry>, AdminMenuError> {
        self.reader
            .list_all_menus()
            .await
            .map_err(AdminMenuError::from)
    }

    pub async fn create_menu(&self, command: MenuItemCommand) -> Result<MenuEntry, AdminMenuError> {
        let params = CreateMenuParams {
            label: normalize_label(&command.label)?,
            path: normalize_path(&command.path)?,
            display_order: command.display_order,
            visibility: command.visibility,
            active: command.active,
        };

        let entry = self.writer.create_menu(params).await?;
        self.cache_trigger.menu_mutated().await;
        Ok(entry)
    }

    pub async fn update_menu(
        &self,
        id: Uuid,
        command: MenuItemCommand,
    ) -> Result<MenuEntry, AdminMenuError> {
        let params = UpdateMenuParams {
            id,
            label: normalize_label(&command.label)?,
            path: normalize_path(&command.path)?,
            display_order: command.display_order,
            visibility: command.visibility,
            active: command.active,
        };

        let entry = self.writer.update_menu(params).await?;
        self.cache_trigger.menu_mutated().await;
        Ok(entry)
    }

    /// Deleting an entry also removes its children.
    pub async fn delete_menu(&self, id: Uuid) -> Result<(), AdminMenuError> {
        self.writer.delete_menu(id).await?;
        self.cache_trigger.menu_mutated().await;
        Ok(())
    }

    pub async fn reorder(&self, command: ReorderCommand) -> Result<(), AdminMenuError> {
        if command.order.is_empty() {
            return Err(AdminMenuError::ConstraintViolation(
                "order must list at least one menu item".to_string(),
            ));
        }
        let mut seen = HashSet::with_capacity(command.order.len());
        if let Some(duplicate) = command.order.iter().find(|item| !seen.insert(item.id)) {
            return Err(AdminMenuError::ConstraintViolation(format!(
                "menu item `{}` appears more than once",
                duplicate.id
            )));
        }

        self.writer.reorder_menus(&command.order).await?;
        self.cache_trigger.menu_mutated().await;
        Ok(())
    }

    pub async fn create_sub_menu(
        &self,
        menu_id: Uuid,
        command: MenuItemCommand,
    ) -> Result<SubMenuEntry, AdminMenuError> {
        let params = CreateSubMenuParams {
            menu_id,
            label: normalize_label(&command.label)?,
            path: normalize_path(&command.path)?,
            display_order: command.display_order,
            visibility: command.visibility,
            active: command.active,
        };

        let entry = self.writer.create_sub_menu(params).await?;
        self.cache_trigger.menu_mutated().await;
        Ok(entry)
    }

    pub async fn update_sub_menu(
        &self,
        id: Uuid,
        command: MenuItemCommand,
    ) -> Result<SubMenuEntry, AdminMenuError> {
        let params = UpdateSubMenuParams {
            id,
            label: normalize_label(&command.label)?,
            path: normalize_path(&command.path)?,
            display_order: command.display_order,
            visibility: command.visibility,
            active: command.active,
        };

        let entry = self.writer.update_sub_menu(params).await?;
        self.cache_trigger.menu_mutated().await;
        Ok(entry)
    }

    pub async fn delete_sub_menu(&self, id: Uuid) -> Result<(), AdminMenuError> {
        self.writer.delete_sub_menu(id).await?;
        self.cache_trigger.menu_mutated().await;
        Ok(())
    }

    /// Purge the menu cache without touching menu data.
    pub async fn invalidate(&self) {
        self.cache_trigger.menu_mutated().await;
    }
}
