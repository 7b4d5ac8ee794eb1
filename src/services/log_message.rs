//! Log message service
//!
//! Stores cleaned messages and answers the home page, paginated list,
//! archive and search queries.

use crate::db::repositories::LogMessageRepository;
use crate::models::{ListParams, LogMessage, PagedResult, LOG_MESSAGE_MAX_LEN};
use crate::services::period::{month_range, year_range};
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Messages shown on the home page
pub const HOME_MESSAGES: i64 = 5;

/// Messages shown in "recent" sidebars
pub const RECENT_MESSAGES: i64 = 3;

/// Error types for log message service operations
#[derive(Debug, thiserror::Error)]
pub enum LogMessageServiceError {
    #[error("Log message not found: {0}")]
    NotFound(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Log message service
pub struct LogMessageService {
    repo: Arc<dyn LogMessageRepository>,
}

impl LogMessageService {
    pub fn new(repo: Arc<dyn LogMessageRepository>) -> Self {
        Self { repo }
    }

    /// Store a message stamped with the current time
    pub async fn log(&self, message: &str) -> Result<LogMessage, LogMessageServiceError> {
        self.log_at(message, Utc::now()).await
    }

    pub async fn log_at(
        &self,
        message: &str,
        log_date: DateTime<Utc>,
    ) -> Result<LogMessage, LogMessageServiceError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(LogMessageServiceError::ValidationError(
                "Message cannot be empty".to_string(),
            ));
        }
        if message.chars().count() > LOG_MESSAGE_MAX_LEN {
            return Err(LogMessageServiceError::ValidationError(format!(
                "Message must be at most {} characters",
                LOG_MESSAGE_MAX_LEN
            )));
        }

        let logged = self
            .repo
            .create(message, log_date)
            .await
            .context("Failed to store log message")?;
        tracing::info!("Logged message {}", logged.id);
        Ok(logged)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<LogMessage, LogMessageServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get log message")?
            .ok_or(LogMessageServiceError::NotFound(id))
    }

    /// The `n` newest messages
    pub async fn recent(&self, n: i64) -> Result<Vec<LogMessage>, LogMessageServiceError> {
        Ok(self
            .repo
            .recent(n.max(0))
            .await
            .context("Failed to list recent messages")?)
    }

    /// One page of messages, newest first. A page past the end is
    /// clamped to the last page.
    pub async fn paginated(
        &self,
        params: ListParams,
    ) -> Result<PagedResult<LogMessage>, LogMessageServiceError> {
        let total = self.count().await?;
        let params = params.clamp_to(total);
        let items = self
            .repo
            .page(params.offset(), params.limit())
            .await
            .context("Failed to list messages")?;
        Ok(PagedResult::new(items, total, &params))
    }

    pub async fn count(&self) -> Result<i64, LogMessageServiceError> {
        Ok(self.repo.count().await.context("Failed to count messages")?)
    }

    /// Messages logged during `year` (UTC), newest first
    pub async fn for_year(&self, year: i32) -> Result<Vec<LogMessage>, LogMessageServiceError> {
        let (start, end) = year_range(year).ok_or_else(|| {
            LogMessageServiceError::ValidationError(format!("Year out of range: {}", year))
        })?;
        Ok(self
            .repo
            .between(start, end)
            .await
            .context("Failed to list messages for year")?)
    }

    /// Messages logged during one month (UTC), newest first
    pub async fn for_month(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Vec<LogMessage>, LogMessageServiceError> {
        let (start, end) = month_range(year, month).ok_or_else(|| {
            LogMessageServiceError::ValidationError(format!("Invalid month: {}/{}", month, year))
        })?;
        Ok(self
            .repo
            .between(start, end)
            .await
            .context("Failed to list messages for month")?)
    }

    /// Case-insensitive substring search
    pub async fn search(
        &self,
        query: &str,
        limit: i64,
    ) -> Result<Vec<LogMessage>, LogMessageServiceError> {
        Ok(self
            .repo
            .search(query, limit)
            .await
            .context("Failed to search messages")?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxLogMessageRepository;
    use crate::db::{create_test_pool, migrations};
    use chrono::TimeZone;

    async fn setup_test_service() -> LogMessageService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        LogMessageService::new(SqlxLogMessageRepository::boxed(pool))
    }

    fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_log_and_recent() {
        let service = setup_test_service().await;
        service.log_at("first message", at(2024, 1, 1)).await.unwrap();
        service.log_at("second message", at(2024, 1, 2)).await.unwrap();
        service.log("third message").await.unwrap();

        let recent = service.recent(2).await.unwrap();
        let texts: Vec<&str> = recent.iter().map(|m| m.message.as_str()).collect();
        assert_eq!(texts, vec!["third message", "second message"]);
        assert_eq!(service.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_log_validation() {
        let service = setup_test_service().await;
        assert!(matches!(
            service.log("   ").await,
            Err(LogMessageServiceError::ValidationError(_))
        ));
        assert!(matches!(
            service.log(&"x".repeat(LOG_MESSAGE_MAX_LEN + 1)).await,
            Err(LogMessageServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_year_and_month_archives() {
        let service = setup_test_service().await;
        service.log_at("new year", at(2024, 1, 1)).await.unwrap();
        service.log_at("valentine", at(2024, 2, 14)).await.unwrap();
        service
            .log_at("last second", Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap())
            .await
            .unwrap();

        let year = service.for_year(2024).await.unwrap();
        assert_eq!(year.len(), 2);
        assert_eq!(year[0].message, "valentine");

        assert_eq!(service.for_year(2023).await.unwrap().len(), 1);
        assert!(service.for_year(2022).await.unwrap().is_empty());

        let february = service.for_month(2024, 2).await.unwrap();
        assert_eq!(february.len(), 1);
        assert_eq!(february[0].message, "valentine");

        assert!(matches!(
            service.for_month(2024, 13).await,
            Err(LogMessageServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_pagination_clamps_to_last_page() {
        let service = setup_test_service().await;
        for day in 1..=12 {
            service
                .log_at(&format!("message {:02}", day), at(2024, 3, day))
                .await
                .unwrap();
        }

        let first = service.paginated(ListParams::new(1, 10)).await.unwrap();
        assert_eq!(first.items.len(), 10);
        assert_eq!(first.total, 12);
        assert_eq!(first.total_pages(), 2);
        assert_eq!(first.items[0].message, "message 12");

        let beyond = service.paginated(ListParams::new(9, 10)).await.unwrap();
        assert_eq!(beyond.page, 2);
        assert_eq!(beyond.items.len(), 2);
        assert_eq!(beyond.items[1].message, "message 01");
    }

    #[tokio::test]
    async fn test_empty_pagination() {
        let service = setup_test_service().await;
        let page = service.paginated(ListParams::new(3, 10)).await.unwrap();
        assert_eq!(page.page, 1);
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn test_search_ignores_case() {
        let service = setup_test_service().await;
        service.log("Hello Django world").await.unwrap();
        service.log("Nothing here").await.unwrap();

        let found = service.search("django", 10).await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(service.search("100%", 10).await.unwrap().is_empty());
    }
}
