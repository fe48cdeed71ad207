use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{
        CreateMenuParams, CreateSubMenuParams, MenuLimits, MenuOrderParams, MenuRepo,
        MenuWriteRepo, RepoError, UpdateMenuParams, UpdateSubMenuParams,
    },
    domain::{
        entities::{MenuEntry, SubMenuEntry},
        types::VisibilityLevel,
    },
};

use super::{PostgresRepositories, map_sqlx_error};

const MENU_COLUMNS: &str = "id, label, path, display_order, visibility, active, updated_at";
const SUB_MENU_COLUMNS: &str =
    "id, menu_id, label, path, display_order, visibility, active, updated_at";

#[derive(sqlx::FromRow)]
struct MenuRow {
    id: Uuid,
    label: String,
    path: String,
    display_order: i32,
    visibility: VisibilityLevel,
    active: bool,
    updated_at: OffsetDateTime,
}

impl MenuRow {
    fn into_entry(self, children: Vec<SubMenuEntry>) -> MenuEntry {
        MenuEntry {
            id: self.id,
            label: self.label,
            path: self.path,
            display_order: self.display_order,
            visibility: self.visibility,
            active: self.active,
            updated_at: self.updated_at,
            children,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SubMenuRow {
    id: Uuid,
    menu_id: Uuid,
    label: String,
    path: String,
    display_order: i32,
    visibility: VisibilityLevel,
    active: bool,
    updated_at: OffsetDateTime,
}

impl From<SubMenuRow> for SubMenuEntry {
    fn from(row: SubMenuRow) -> Self {
        Self {
            id: row.id,
            menu_id: row.menu_id,
            label: row.label,
            path: row.path,
            display_order: row.display_order,
            visibility: row.visibility,
            active: row.active,
            updated_at: row.updated_at,
        }
    }
}

fn push_level_filter(qb: &mut QueryBuilder<'_, Postgres>, column: &str, levels: &[VisibilityLevel]) {
    qb.push(" AND ");
    qb.push(column);
    qb.push(" IN (");
    let mut separated = qb.separated(", ");
    for level in levels {
        separated.push_bind(*level);
    }
    separated.push_unseparated(")");
}

/// Attach children to their parents, keeping both orderings intact.
fn assemble(parents: Vec<MenuRow>, children: Vec<SubMenuRow>) -> Vec<MenuEntry> {
    let mut by_parent: HashMap<Uuid, Vec<SubMenuEntry>> = HashMap::new();
    for child in children {
        by_parent
            .entry(child.menu_id)
            .or_default()
            .push(SubMenuEntry::from(child));
    }

    parents
        .into_iter()
        .map(|row| {
            let children = by_parent.remove(&row.id).unwrap_or_default();
            row.into_entry(children)
        })
        .collect()
}

#[async_trait]
impl MenuRepo for PostgresRepositories {
    async fn fetch_menus(
        &self,
        levels: &[VisibilityLevel],
        limits: MenuLimits,
    ) -> Result<Vec<MenuEntry>, RepoError> {
        if levels.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::new(format!(
            "SELECT {MENU_COLUMNS} FROM menus WHERE active = TRUE"
        ));
        push_level_filter(&mut qb, "visibility", levels);
        qb.push(" ORDER BY display_order ASC, id ASC");
        if let Some(max) = limits.entries {
            qb.push(" LIMIT ");
            qb.push_bind(i64::from(max));
        }

        let parents = qb
            .build_query_as::<MenuRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        if parents.is_empty() {
            return Ok(Vec::new());
        }

        let parent_ids: Vec<Uuid> = parents.iter().map(|row| row.id).collect();
        let mut qb = QueryBuilder::new(format!(
            "SELECT {SUB_MENU_COLUMNS} FROM ( \
                SELECT s.*, ROW_NUMBER() OVER ( \
                    PARTITION BY s.menu_id ORDER BY s.display_order ASC, s.id ASC \
                ) AS rank_in_parent \
                FROM sub_menus s \
                WHERE s.active = TRUE AND s.menu_id = ANY("
        ));
        qb.push_bind(parent_ids);
        qb.push(")");
        push_level_filter(&mut qb, "s.visibility", levels);
        qb.push(") ranked");
        if let Some(max) = limits.children_per_entry {
            qb.push(" WHERE rank_in_parent <= ");
            qb.push_bind(i64::from(max));
        }
        qb.push(" ORDER BY menu_id, display_order ASC, id ASC");

        let children = qb
            .build_query_as::<SubMenuRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(assemble(parents, children))
    }

    async fn list_all_menus(&self) -> Result<Vec<MenuEntry>, RepoError> {
        let parents = sqlx::query_as::<_, MenuRow>(&format!(
            "SELECT {MENU_COLUMNS} FROM menus ORDER BY display_order ASC, id ASC"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let children = sqlx::query_as::<_, SubMenuRow>(&format!(
            "SELECT {SUB_MENU_COLUMNS} FROM sub_menus ORDER BY menu_id, display_order ASC, id ASC"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(assemble(parents, children))
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        self.ping().await.map_err(map_sqlx_error)
    }
}

#[async_trait]
impl MenuWriteRepo for PostgresRepositories {
    async fn create_menu(&self, params: CreateMenuParams) -> Result<MenuEntry, RepoError> {
        let CreateMenuParams {
            label,
            path,
            display_order,
            visibility,
            active,
        } = params;

        let row = sqlx::query_as::<_, MenuRow>(&format!(
            "INSERT INTO menus (id, label, path, display_order, visibility, active) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {MENU_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(label)
        .bind(path)
        .bind(display_order)
        .bind(visibility)
        .bind(active)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into_entry(Vec::new()))
    }

    async fn update_menu(&self, params: UpdateMenuParams) -> Result<MenuEntry, RepoError> {
        let UpdateMenuParams {
            id,
            label,
            path,
            display_order,
            visibility,
            active,
        } = params;

        let row = sqlx::query_as::<_, MenuRow>(&format!(
            "UPDATE menus \
             SET label = $2, path = $3, display_order = $4, visibility = $5, active = $6, \
                 updated_at = now() \
             WHERE id = $1 \
             RETURNING {MENU_COLUMNS}"
        ))
        .bind(id)
        .bind(label)
        .bind(path)
        .bind(display_order)
        .bind(visibility)
        .bind(active)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        Ok(row.into_entry(Vec::new()))
    }

    async fn delete_menu(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM menus WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn reorder_menus(&self, order: &[MenuOrderParams]) -> Result<(), RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        for item in order {
            let result = sqlx::query(
                "UPDATE menus SET display_order = $2, updated_at = now() WHERE id = $1",
            )
            .bind(item.id)
            .bind(item.display_order)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

            if result.rows_affected() == 0 {
                return Err(RepoError::NotFound);
            }
        }

        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn create_sub_menu(
        &self,
        params: CreateSubMenuParams,
    ) -> Result<SubMenuEntry, RepoError> {
        let CreateSubMenuParams {
            menu_id,
            label,
            path,
            display_order,
            visibility,
            active,
        } = params;

        // Selecting the parent makes a missing menu an empty insert.
        let row = sqlx::query_as::<_, SubMenuRow>(&format!(
            "INSERT INTO sub_menus (id, menu_id, label, path, display_order, visibility, active) \
             SELECT $1, m.id, $3, $4, $5, $6, $7 FROM menus m WHERE m.id = $2 \
             RETURNING {SUB_MENU_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(menu_id)
        .bind(label)
        .bind(path)
        .bind(display_order)
        .bind(visibility)
        .bind(active)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        Ok(SubMenuEntry::from(row))
    }

    async fn update_sub_menu(
        &self,
        params: UpdateSubMenuParams,
    ) -> Result<SubMenuEntry, RepoError> {
        let UpdateSubMenuParams {
            id,
            label,
            path,
            display_order,
            visibility,
            active,
        } = params;

        let row = sqlx::query_as::<_, SubMenuRow>(&format!(
            "UPDATE sub_menus \
             SET label = $2, path = $3, display_order = $4, visibility = $5, active = $6, \
                 updated_at = now() \
             WHERE id = $1 \
             RETURNING {SUB_MENU_COLUMNS}"
        ))
        .bind(id)
        .bind(label)
        .bind(path)
        .bind(display_order)
        .bind(visibility)
        .bind(active)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        Ok(SubMenuEntry::from(row))
    }

    async fn delete_sub_menu(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM sub_menus WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn menu_row(id: Uuid, order: i32) -> MenuRow {
        MenuRow {
            id,
            label: format!("menu-{order}"),
            path: format!("/m/{order}"),
            display_order: order,
            visibility: VisibilityLevel::Guest,
            active: true,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn sub_row(menu_id: Uuid, order: i32) -> SubMenuRow {
        SubMenuRow {
            id: Uuid::new_v4(),
            menu_id,
            label: format!("sub-{order}"),
            path: format!("/s/{order}"),
            display_order: order,
            visibility: VisibilityLevel::Guest,
            active: true,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn assemble_keeps_parent_and_child_order() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let entries = assemble(
            vec![menu_row(first, 1), menu_row(second, 2)],
            vec![sub_row(second, 1), sub_row(first, 1), sub_row(second, 2)],
        );

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, first);
        assert_eq!(entries[0].children.len(), 1);
        let orders: Vec<i32> = entries[1].children.iter().map(|c| c.display_order).collect();
        assert_eq!(orders, vec![1, 2]);
    }

    #[test]
    fn level_filter_binds_each_level() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM menus WHERE TRUE");
        push_level_filter(
            &mut qb,
            "visibility",
            &[VisibilityLevel::Guest, VisibilityLevel::User],
        );
        assert_eq!(
            qb.sql(),
            "SELECT 1 FROM menus WHERE TRUE AND visibility IN ($1, $2)"
        );
    }
}
