//! Group repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Group, GroupWithMemberCount};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

/// Group repository trait
#[async_trait]
pub trait GroupRepository: Send + Sync {
    async fn create(&self, name: &str, slug: &str) -> Result<Group>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Group>>;

    async fn slug_taken(&self, slug: &str) -> Result<bool>;

    async fn name_taken(&self, name: &str) -> Result<bool>;

    /// All groups ordered by name
    async fn list(&self) -> Result<Vec<Group>>;

    /// Adding an existing member is a no-op
    async fn add_member(&self, group_id: i64, person_id: i64) -> Result<()>;

    async fn remove_member(&self, group_id: i64, person_id: i64) -> Result<bool>;

    async fn member_ids(&self, group_id: i64) -> Result<Vec<i64>>;

    /// Groups with the most members first, ties broken by name
    async fn top_by_member_count(&self, limit: i64) -> Result<Vec<GroupWithMemberCount>>;
}

/// SQLx-based group repository
pub struct SqlxGroupRepository {
    pool: DynDatabasePool,
}

impl SqlxGroupRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn GroupRepository> {
        Arc::new(Self::new(pool))
    }

    async fn count(&self, sql: &str, value: &str) -> Result<i64> {
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query_scalar(sql)
                    .bind(value)
                    .fetch_one(self.pool.sqlite()?)
                    .await?
            }
            DatabaseDriver::Mysql => {
                sqlx::query_scalar(sql)
                    .bind(value)
                    .fetch_one(self.pool.mysql()?)
                    .await?
            }
        };
        Ok(count)
    }
}

#[async_trait]
impl GroupRepository for SqlxGroupRepository {
    async fn create(&self, name: &str, slug: &str) -> Result<Group> {
        let sql = "INSERT INTO polls_group (name, slug) VALUES (?, ?)";
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(name)
                .bind(slug)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create group")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(name)
                .bind(slug)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to create group")?
                .last_insert_id() as i64,
        };
        Ok(Group {
            id,
            name: name.to_string(),
            slug: slug.to_string(),
        })
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Group>> {
        let sql = "SELECT id, name, slug FROM polls_group WHERE slug = ?";
        let group = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(slug)
                .fetch_optional(self.pool.sqlite()?)
                .await
                .context("Failed to get group by slug")?
                .map(|row| Group {
                    id: row.get("id"),
                    name: row.get("name"),
                    slug: row.get("slug"),
                }),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(slug)
                .fetch_optional(self.pool.mysql()?)
                .await
                .context("Failed to get group by slug")?
                .map(|row| Group {
                    id: row.get("id"),
                    name: row.get("name"),
                    slug: row.get("slug"),
                }),
        };
        Ok(group)
    }

    async fn slug_taken(&self, slug: &str) -> Result<bool> {
        let count = self
            .count("SELECT COUNT(*) FROM polls_group WHERE slug = ?", slug)
            .await
            .context("Failed to check group slug")?;
        Ok(count > 0)
    }

    async fn name_taken(&self, name: &str) -> Result<bool> {
        let count = self
            .count("SELECT COUNT(*) FROM polls_group WHERE name = ?", name)
            .await
            .context("Failed to check group name")?;
        Ok(count > 0)
    }

    async fn list(&self) -> Result<Vec<Group>> {
        let sql = "SELECT id, name, slug FROM polls_group ORDER BY name";
        let groups = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to list groups")?
                .iter()
                .map(|row| Group {
                    id: row.get("id"),
                    name: row.get("name"),
                    slug: row.get("slug"),
                })
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to list groups")?
                .iter()
                .map(|row| Group {
                    id: row.get("id"),
                    name: row.get("name"),
                    slug: row.get("slug"),
                })
                .collect(),
        };
        Ok(groups)
    }

    async fn add_member(&self, group_id: i64, person_id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(
                    "INSERT OR IGNORE INTO polls_group_members (group_id, person_id) VALUES (?, ?)",
                )
                .bind(group_id)
                .bind(person_id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to add group member")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(
                    "INSERT IGNORE INTO polls_group_members (group_id, person_id) VALUES (?, ?)",
                )
                .bind(group_id)
                .bind(person_id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to add group member")?;
            }
        }
        Ok(())
    }

    async fn remove_member(&self, group_id: i64, person_id: i64) -> Result<bool> {
        let sql = "DELETE FROM polls_group_members WHERE group_id = ? AND person_id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(group_id)
                .bind(person_id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to remove group member")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(group_id)
                .bind(person_id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to remove group member")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn member_ids(&self, group_id: i64) -> Result<Vec<i64>> {
        let sql = "SELECT person_id FROM polls_group_members WHERE group_id = ? ORDER BY person_id";
        let ids = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_scalar(sql)
                .bind(group_id)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to list group members")?,
            DatabaseDriver::Mysql => sqlx::query_scalar(sql)
                .bind(group_id)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to list group members")?,
        };
        Ok(ids)
    }

    async fn top_by_member_count(&self, limit: i64) -> Result<Vec<GroupWithMemberCount>> {
        let sql = r#"
            SELECT g.name AS name, g.slug AS slug, COUNT(gm.person_id) AS members
            FROM polls_group g
            LEFT JOIN polls_group_members gm ON gm.group_id = g.id
            GROUP BY g.id, g.name, g.slug
            ORDER BY members DESC, g.name
            LIMIT ?
        "#;
        let groups = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(limit)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to rank groups")?
                .iter()
                .map(|row| GroupWithMemberCount {
                    name: row.get("name"),
                    slug: row.get("slug"),
                    members: row.get("members"),
                })
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(limit)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to rank groups")?
                .iter()
                .map(|row| GroupWithMemberCount {
                    name: row.get("name"),
                    slug: row.get("slug"),
                    members: row.get("members"),
                })
                .collect(),
        };
        Ok(groups)
    }
}
