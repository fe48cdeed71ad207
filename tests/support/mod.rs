//! In-memory stand-ins for Postgres and Redis shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use atrium::application::repos::{
    CreateMenuParams, CreateSubMenuParams, MenuLimits, MenuOrderParams, MenuRepo, MenuWriteRepo,
    RepoError, UpdateMenuParams, UpdateSubMenuParams,
};
use atrium::cache::{SharedStore, SharedStoreError};
use atrium::domain::entities::{MenuEntry, SubMenuEntry};
use atrium::domain::types::VisibilityLevel;
use time::OffsetDateTime;
use tokio::sync::Barrier;
use uuid::Uuid;

/// Menu store that applies the same filtering and ordering rules as the
/// Postgres repository.
#[derive(Default)]
pub struct InMemoryMenus {
    entries: Mutex<Vec<MenuEntry>>,
    fetches: AtomicUsize,
    failing: AtomicBool,
    gate: Mutex<Option<Arc<Barrier>>>,
}

impl InMemoryMenus {
    pub fn with_entries(entries: Vec<MenuEntry>) -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(entries),
            ..Self::default()
        })
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Every fetch waits on `barrier` before answering.
    pub fn gate_fetches(&self, barrier: Arc<Barrier>) {
        *self.gate.lock().unwrap() = Some(barrier);
    }

    /// Visible snapshot computed without any cache in between.
    pub fn direct(&self, levels: &[VisibilityLevel]) -> Vec<MenuEntry> {
        self.visible(levels, MenuLimits::unbounded())
    }

    /// Mirrors the SQL adapter: filter, order by `(display_order, id)`, then cap.
    fn visible(&self, levels: &[VisibilityLevel], limits: MenuLimits) -> Vec<MenuEntry> {
        let entries = self.entries.lock().unwrap();
        let mut visible: Vec<MenuEntry> = entries
            .iter()
            .filter(|entry| entry.active && levels.contains(&entry.visibility))
            .cloned()
            .map(|mut entry| {
                entry
                    .children
                    .retain(|child| child.active && levels.contains(&child.visibility));
                entry
                    .children
                    .sort_by_key(|child| (child.display_order, child.id));
                if let Some(cap) = limits.children_per_entry {
                    entry.children.truncate(cap as usize);
                }
                entry
            })
            .collect();
        visible.sort_by_key(|entry| (entry.display_order, entry.id));
        if let Some(cap) = limits.entries {
            visible.truncate(cap as usize);
        }
        visible
    }
}

#[async_trait]
impl MenuRepo for InMemoryMenus {
    async fn fetch_menus(
        &self,
        levels: &[VisibilityLevel],
        limits: MenuLimits,
    ) -> Result<Vec<MenuEntry>, RepoError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().unwrap().clone();
        if let Some(barrier) = gate {
            barrier.wait().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(RepoError::Timeout);
        }
        Ok(self.visible(levels, limits))
    }

    async fn list_all_menus(&self) -> Result<Vec<MenuEntry>, RepoError> {
        Ok(self.entries.lock().unwrap().clone())
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RepoError::Timeout);
        }
        Ok(())
    }
}

#[async_trait]
impl MenuWriteRepo for InMemoryMenus {
    async fn create_menu(&self, params: CreateMenuParams) -> Result<MenuEntry, RepoError> {
        let entry = MenuEntry {
            id: Uuid::new_v4(),
            label: params.label,
            path: params.path,
            display_order: params.display_order,
            visibility: params.visibility,
            active: params.active,
            updated_at: OffsetDateTime::now_utc(),
            children: Vec::new(),
        };
        self.entries.lock().unwrap().push(entry.clone());
        Ok(entry)
    }

    async fn update_menu(&self, params: UpdateMenuParams) -> Result<MenuEntry, RepoError> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .iter_mut()
            .find(|entry| entry.id == params.id)
            .ok_or(RepoError::NotFound)?;
        entry.label = params.label;
        entry.path = params.path;
        entry.display_order = params.display_order;
        entry.visibility = params.visibility;
        entry.active = params.active;
        entry.updated_at = OffsetDateTime::now_utc();
        Ok(MenuEntry {
            children: Vec::new(),
            ..entry.clone()
        })
    }

    async fn delete_menu(&self, id: Uuid) -> Result<(), RepoError> {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        if entries.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn reorder_menus(&self, order: &[MenuOrderParams]) -> Result<(), RepoError> {
        let mut entries = self.entries.lock().unwrap();
        for item in order {
            let entry = entries
                .iter_mut()
                .find(|entry| entry.id == item.id)
                .ok_or(RepoError::NotFound)?;
            entry.display_order = item.display_order;
        }
        Ok(())
    }

    async fn create_sub_menu(
        &self,
        params: CreateSubMenuParams,
    ) -> Result<SubMenuEntry, RepoError> {
        let mut entries = self.entries.lock().unwrap();
        let parent = entries
            .iter_mut()
            .find(|entry| entry.id == params.menu_id)
            .ok_or(RepoError::NotFound)?;
        let child = SubMenuEntry {
            id: Uuid::new_v4(),
            menu_id: params.menu_id,
            label: params.label,
            path: params.path,
            display_order: params.display_order,
            visibility: params.visibility,
            active: params.active,
            updated_at: OffsetDateTime::now_utc(),
        };
        parent.children.push(child.clone());
        Ok(child)
    }

    async fn update_sub_menu(
        &self,
        params: UpdateSubMenuParams,
    ) -> Result<SubMenuEntry, RepoError> {
        let mut entries = self.entries.lock().unwrap();
        let child = entries
            .iter_mut()
            .flat_map(|entry| entry.children.iter_mut())
            .find(|child| child.id == params.id)
            .ok_or(RepoError::NotFound)?;
        child.label = params.label;
        child.path = params.path;
        child.display_order = params.display_order;
        child.visibility = params.visibility;
        child.active = params.active;
        child.updated_at = OffsetDateTime::now_utc();
        Ok(child.clone())
    }

    async fn delete_sub_menu(&self, id: Uuid) -> Result<(), RepoError> {
        let mut entries = self.entries.lock().unwrap();
        let mut removed = false;
        for entry in entries.iter_mut() {
            let before = entry.children.len();
            entry.children.retain(|child| child.id != id);
            removed |= entry.children.len() != before;
        }
        if removed { Ok(()) } else { Err(RepoError::NotFound) }
    }
}

/// Shared tier backed by a plain map, standing in for Redis.
#[derive(Default)]
pub struct MemoryShared {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryShared {
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }

    pub fn put_raw(&self, key: &str, bytes: &[u8]) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), bytes.to_vec());
    }
}

#[async_trait]
impl SharedStore for MemoryShared {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SharedStoreError> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>, _ttl: Duration) -> Result<(), SharedStoreError> {
        self.entries.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, SharedStoreError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .keys()
            .filter(|key| key.contains(pattern))
            .cloned()
            .collect())
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, SharedStoreError> {
        let mut entries = self.entries.lock().unwrap();
        Ok(keys
            .iter()
            .filter(|key| entries.remove(key.as_str()).is_some())
            .count() as u64)
    }
}

/// Shared tier that refuses every call.
pub struct UnreachableShared;

#[async_trait]
impl SharedStore for UnreachableShared {
    fn backend(&self) -> &'static str {
        "unreachable"
    }

    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, SharedStoreError> {
        Err(refused())
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<(), SharedStoreError> {
        Err(refused())
    }

    async fn keys(&self, _pattern: &str) -> Result<Vec<String>, SharedStoreError> {
        Err(refused())
    }

    async fn delete(&self, _keys: &[String]) -> Result<u64, SharedStoreError> {
        Err(refused())
    }
}

fn refused() -> SharedStoreError {
    SharedStoreError::Unavailable("connection refused".to_string())
}

/// Shared tier whose calls never complete.
pub struct StalledShared;

#[async_trait]
impl SharedStore for StalledShared {
    fn backend(&self) -> &'static str {
        "stalled"
    }

    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, SharedStoreError> {
        std::future::pending().await
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<(), SharedStoreError> {
        std::future::pending().await
    }

    async fn keys(&self, _pattern: &str) -> Result<Vec<String>, SharedStoreError> {
        std::future::pending().await
    }

    async fn delete(&self, _keys: &[String]) -> Result<u64, SharedStoreError> {
        std::future::pending().await
    }
}

pub fn menu(label: &str, order: i32, visibility: VisibilityLevel) -> MenuEntry {
    MenuEntry {
        id: Uuid::new_v4(),
        label: label.to_string(),
        path: format!("/{}", label.to_lowercase().replace(' ', "-")),
        display_order: order,
        visibility,
        active: true,
        updated_at: OffsetDateTime::UNIX_EPOCH,
        children: Vec::new(),
    }
}

pub fn child(parent: &MenuEntry, label: &str, order: i32, visibility: VisibilityLevel) -> SubMenuEntry {
    SubMenuEntry {
        id: Uuid::new_v4(),
        menu_id: parent.id,
        label: label.to_string(),
        path: format!("{}/{}", parent.path, label.to_lowercase().replace(' ', "-")),
        display_order: order,
        visibility,
        active: true,
        updated_at: OffsetDateTime::UNIX_EPOCH,
    }
}

/// A blog navigation mixing every visibility level, including hidden items.
pub fn blog_navigation() -> Vec<MenuEntry> {
    let home = menu("Home", 0, VisibilityLevel::Guest);

    let mut blog = menu("Blog", 1, VisibilityLevel::Guest);
    blog.children = vec![
        child(&blog, "Releases", 0, VisibilityLevel::Guest),
        child(&blog, "Drafts", 1, VisibilityLevel::Admin),
    ];

    let account = menu("Account", 2, VisibilityLevel::User);

    let mut console = menu("Console", 3, VisibilityLevel::Admin);
    console.children = vec![child(&console, "Inquiries", 0, VisibilityLevel::Admin)];

    let mut retired = menu("Retired", 4, VisibilityLevel::Guest);
    retired.active = false;

    vec![home, blog, account, console, retired]
}
