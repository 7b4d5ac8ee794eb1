//! Question and choice repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Choice, Question};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use std::sync::Arc;

/// Poll repository trait
#[async_trait]
pub trait PollRepository: Send + Sync {
    async fn create_question(&self, text: &str, pub_date: DateTime<Utc>) -> Result<Question>;

    async fn get_question(&self, id: i64) -> Result<Option<Question>>;

    /// Questions published at or before `now`, newest first
    async fn latest_questions(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Question>>;

    /// Every question, newest first
    async fn list_questions(&self) -> Result<Vec<Question>>;

    async fn add_choice(&self, question_id: i64, text: &str) -> Result<Choice>;

    /// Choices of a question in creation order
    async fn choices_for(&self, question_id: i64) -> Result<Vec<Choice>>;

    /// Every choice, grouped by question
    async fn list_choices(&self) -> Result<Vec<Choice>>;

    /// Atomically add one vote; false when the choice is not part of the question
    async fn vote(&self, question_id: i64, choice_id: i64) -> Result<bool>;
}

/// SQLx-based poll repository
pub struct SqlxPollRepository {
    pool: DynDatabasePool,
}

impl SqlxPollRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PollRepository> {
        Arc::new(Self::new(pool))
    }
}

const SELECT_CHOICE: &str = "SELECT id, question_id, choice_text, votes FROM polls_choice";

macro_rules! question_from_row {
    ($row:expr) => {
        Question {
            id: $row.get("id"),
            question_text: $row.get("question_text"),
            pub_date: $row.get("pub_date"),
        }
    };
}

macro_rules! choice_from_row {
    ($row:expr) => {
        Choice {
            id: $row.get("id"),
            question_id: $row.get("question_id"),
            choice_text: $row.get("choice_text"),
            votes: $row.get("votes"),
        }
    };
}

#[async_trait]
impl PollRepository for SqlxPollRepository {
    async fn create_question(&self, text: &str, pub_date: DateTime<Utc>) -> Result<Question> {
        let sql = "INSERT INTO polls_question (question_text, pub_date) VALUES (?, ?)";
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(text)
                .bind(pub_date)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create question")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(text)
                .bind(pub_date)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to create question")?
                .last_insert_id() as i64,
        };
        Ok(Question {
            id,
            question_text: text.to_string(),
            pub_date,
        })
    }

    async fn get_question(&self, id: i64) -> Result<Option<Question>> {
        let sql = "SELECT id, question_text, pub_date FROM polls_question WHERE id = ?";
        let question = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .fetch_optional(self.pool.sqlite()?)
                .await
                .context("Failed to get question")?
                .map(|row| question_from_row!(row)),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .fetch_optional(self.pool.mysql()?)
                .await
                .context("Failed to get question")?
                .map(|row| question_from_row!(row)),
        };
        Ok(question)
    }

    async fn latest_questions(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Question>> {
        let sql = r#"
            SELECT id, question_text, pub_date FROM polls_question
            WHERE pub_date <= ?
            ORDER BY pub_date DESC, id DESC
            LIMIT ?
        "#;
        let questions = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(now)
                .bind(limit)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to list latest questions")?
                .iter()
                .map(|row| question_from_row!(row))
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(now)
                .bind(limit)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to list latest questions")?
                .iter()
                .map(|row| question_from_row!(row))
                .collect(),
        };
        Ok(questions)
    }

    async fn list_questions(&self) -> Result<Vec<Question>> {
        let sql = "SELECT id, question_text, pub_date FROM polls_question ORDER BY pub_date DESC, id DESC";
        let questions = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to list questions")?
                .iter()
                .map(|row| question_from_row!(row))
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to list questions")?
                .iter()
                .map(|row| question_from_row!(row))
                .collect(),
        };
        Ok(questions)
    }

    async fn add_choice(&self, question_id: i64, text: &str) -> Result<Choice> {
        let sql = "INSERT INTO polls_choice (question_id, choice_text, votes) VALUES (?, ?, 0)";
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(question_id)
                .bind(text)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create choice")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(question_id)
                .bind(text)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to create choice")?
                .last_insert_id() as i64,
        };
        Ok(Choice {
            id,
            question_id,
            choice_text: text.to_string(),
            votes: 0,
        })
    }

    async fn choices_for(&self, question_id: i64) -> Result<Vec<Choice>> {
        let sql = format!("{} WHERE question_id = ? ORDER BY id", SELECT_CHOICE);
        let choices = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&sql)
                .bind(question_id)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to list choices")?
                .iter()
                .map(|row| choice_from_row!(row))
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(&sql)
                .bind(question_id)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to list choices")?
                .iter()
                .map(|row| choice_from_row!(row))
                .collect(),
        };
        Ok(choices)
    }

    async fn list_choices(&self) -> Result<Vec<Choice>> {
        let sql = format!("{} ORDER BY question_id, id", SELECT_CHOICE);
        let choices = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&sql)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to list choices")?
                .iter()
                .map(|row| choice_from_row!(row))
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(&sql)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to list choices")?
                .iter()
                .map(|row| choice_from_row!(row))
                .collect(),
        };
        Ok(choices)
    }

    async fn vote(&self, question_id: i64, choice_id: i64) -> Result<bool> {
        let sql = "UPDATE polls_choice SET votes = votes + 1 WHERE id = ? AND question_id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(choice_id)
                .bind(question_id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to record vote")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(choice_id)
                .bind(question_id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to record vote")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use chrono::Duration;

    async fn setup_test_repo() -> SqlxPollRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxPollRepository::new(pool)
    }

    #[tokio::test]
    async fn test_create_question_with_choices() {
        let repo = setup_test_repo().await;
        let q = repo.create_question("What's up?", Utc::now()).await.unwrap();
        repo.add_choice(q.id, "Not much").await.unwrap();
        repo.add_choice(q.id, "The sky").await.unwrap();

        let found = repo.get_question(q.id).await.unwrap().unwrap();
        assert_eq!(found.question_text, "What's up?");

        let texts: Vec<String> = repo
            .choices_for(q.id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.choice_text)
            .collect();
        assert_eq!(texts, vec!["Not much", "The sky"]);
        assert_eq!(repo.list_choices().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_latest_questions_skip_future() {
        let repo = setup_test_repo().await;
        let now = Utc::now();
        repo.create_question("Old", now - Duration::days(3)).await.unwrap();
        repo.create_question("Recent", now - Duration::hours(1)).await.unwrap();
        repo.create_question("Future", now + Duration::days(3)).await.unwrap();

        let latest: Vec<String> = repo
            .latest_questions(now, 5)
            .await
            .unwrap()
            .into_iter()
            .map(|q| q.question_text)
            .collect();
        assert_eq!(latest, vec!["Recent", "Old"]);
        assert_eq!(repo.list_questions().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_vote_increments_only_matching_choice() {
        let repo = setup_test_repo().await;
        let q = repo.create_question("Q", Utc::now()).await.unwrap();
        let other = repo.create_question("Other", Utc::now()).await.unwrap();
        let choice = repo.add_choice(q.id, "A").await.unwrap();

        assert!(repo.vote(q.id, choice.id).await.unwrap());
        assert!(repo.vote(q.id, choice.id).await.unwrap());
        assert!(!repo.vote(other.id, choice.id).await.unwrap());
        assert!(!repo.vote(q.id, 999).await.unwrap());

        let votes = repo.choices_for(q.id).await.unwrap()[0].votes;
        assert_eq!(votes, 2);
    }

    #[tokio::test]
    async fn test_choice_requires_existing_question() {
        let repo = setup_test_repo().await;
        assert!(repo.add_choice(42, "Orphan").await.is_err());
    }
}
