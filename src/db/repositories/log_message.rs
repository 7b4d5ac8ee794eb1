//! Log message repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::LogMessage;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use std::sync::Arc;

use super::{bind_mysql, bind_sqlite, contains_pattern, Bind};

/// Log message repository trait
#[async_trait]
pub trait LogMessageRepository: Send + Sync {
    async fn create(&self, message: &str, log_date: DateTime<Utc>) -> Result<LogMessage>;

    async fn get_by_id(&self, id: i64) -> Result<Option<LogMessage>>;

    /// Newest first
    async fn recent(&self, limit: i64) -> Result<Vec<LogMessage>>;

    /// Newest first, `limit` rows after skipping `offset`
    async fn page(&self, offset: i64, limit: i64) -> Result<Vec<LogMessage>>;

    async fn count(&self) -> Result<i64>;

    /// Messages logged in `[start, end)`, newest first
    async fn between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<LogMessage>>;

    /// Case-insensitive substring search, newest first
    async fn search(&self, term: &str, limit: i64) -> Result<Vec<LogMessage>>;
}

/// SQLx-based log message repository
pub struct SqlxLogMessageRepository {
    pool: DynDatabasePool,
}

impl SqlxLogMessageRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn LogMessageRepository> {
        Arc::new(Self::new(pool))
    }

    async fn fetch(&self, tail: &str, binds: &[Bind]) -> Result<Vec<LogMessage>> {
        let sql = format!("SELECT id, message, log_date FROM polls_logmessage {}", tail);
        let messages = match self.pool.driver() {
            DatabaseDriver::Sqlite => bind_sqlite(sqlx::query(&sql), binds)
                .fetch_all(self.pool.sqlite()?)
                .await?
                .iter()
                .map(|row| LogMessage {
                    id: row.get("id"),
                    message: row.get("message"),
                    log_date: row.get("log_date"),
                })
                .collect(),
            DatabaseDriver::Mysql => bind_mysql(sqlx::query(&sql), binds)
                .fetch_all(self.pool.mysql()?)
                .await?
                .iter()
                .map(|row| LogMessage {
                    id: row.get("id"),
                    message: row.get("message"),
                    log_date: row.get("log_date"),
                })
                .collect(),
        };
        Ok(messages)
    }
}

const NEWEST_FIRST: &str = "ORDER BY log_date DESC, id DESC";

#[async_trait]
impl LogMessageRepository for SqlxLogMessageRepository {
    async fn create(&self, message: &str, log_date: DateTime<Utc>) -> Result<LogMessage> {
        let sql = "INSERT INTO polls_logmessage (message, log_date) VALUES (?, ?)";
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(message)
                .bind(log_date)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create log message")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(message)
                .bind(log_date)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to create log message")?
                .last_insert_id() as i64,
        };
        Ok(LogMessage {
            id,
            message: message.to_string(),
            log_date,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<LogMessage>> {
        let found = self
            .fetch("WHERE id = ?", &[Bind::Int(id)])
            .await
            .context("Failed to get log message")?;
        Ok(found.into_iter().next())
    }

    async fn recent(&self, limit: i64) -> Result<Vec<LogMessage>> {
        self.fetch(&format!("{} LIMIT ?", NEWEST_FIRST), &[Bind::Int(limit)])
            .await
            .context("Failed to list recent log messages")
    }

    async fn page(&self, offset: i64, limit: i64) -> Result<Vec<LogMessage>> {
        self.fetch(
            &format!("{} LIMIT ? OFFSET ?", NEWEST_FIRST),
            &[Bind::Int(limit), Bind::Int(offset)],
        )
        .await
        .context("Failed to list log messages")
    }

    async fn count(&self) -> Result<i64> {
        let sql = "SELECT COUNT(*) FROM polls_logmessage";
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_scalar(sql)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to count log messages")?,
            DatabaseDriver::Mysql => sqlx::query_scalar(sql)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to count log messages")?,
        };
        Ok(count)
    }

    async fn between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<LogMessage>> {
        self.fetch(
            &format!("WHERE log_date >= ? AND log_date < ? {}", NEWEST_FIRST),
            &[Bind::Time(start), Bind::Time(end)],
        )
        .await
        .context("Failed to list log messages by date")
    }

    async fn search(&self, term: &str, limit: i64) -> Result<Vec<LogMessage>> {
        self.fetch(
            &format!("WHERE LOWER(message) LIKE ? ESCAPE '!' {} LIMIT ?", NEWEST_FIRST),
            &[Bind::Text(contains_pattern(term)), Bind::Int(limit)],
        )
        .await
        .context("Failed to search log messages")
    }
}
