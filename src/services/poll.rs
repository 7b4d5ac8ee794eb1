//! Poll service
//!
//! Questions with their choices, and voting.

use crate::db::repositories::PollRepository;
use crate::models::{Choice, CreateQuestionInput, Question, QuestionWithChoices};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

/// Maximum length of question and choice texts
pub const POLL_TEXT_MAX_LEN: usize = 255;

/// Default size of `latest()`
pub const LATEST_QUESTIONS: i64 = 5;

/// Error types for poll service operations
#[derive(Debug, thiserror::Error)]
pub enum PollServiceError {
    #[error("Question not found: {0}")]
    QuestionNotFound(i64),

    #[error("Choice {choice_id} does not belong to question {question_id}")]
    ChoiceNotFound { question_id: i64, choice_id: i64 },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Poll service
pub struct PollService {
    repo: Arc<dyn PollRepository>,
}

impl PollService {
    pub fn new(repo: Arc<dyn PollRepository>) -> Self {
        Self { repo }
    }

    /// Create a question and its choices. `pub_date` defaults to now.
    pub async fn create_question(
        &self,
        input: CreateQuestionInput,
    ) -> Result<QuestionWithChoices, PollServiceError> {
        let text = validate_text("Question text", &input.question_text)?;
        let choice_texts = input
            .choices
            .iter()
            .map(|c| validate_text("Choice text", c))
            .collect::<Result<Vec<_>, _>>()?;

        let pub_date = input.pub_date.unwrap_or_else(Utc::now);
        let question = self
            .repo
            .create_question(&text, pub_date)
            .await
            .context("Failed to create question")?;

        let mut choices = Vec::with_capacity(choice_texts.len());
        for choice_text in &choice_texts {
            let choice = self
                .repo
                .add_choice(question.id, choice_text)
                .await
                .context("Failed to add choice")?;
            choices.push(choice);
        }

        Ok(QuestionWithChoices { question, choices })
    }

    pub async fn add_choice(&self, question_id: i64, text: &str) -> Result<Choice, PollServiceError> {
        let text = validate_text("Choice text", text)?;
        self.question(question_id).await?;
        Ok(self
            .repo
            .add_choice(question_id, &text)
            .await
            .context("Failed to add choice")?)
    }

    /// The question together with its choices and vote counts
    pub async fn get(&self, id: i64) -> Result<QuestionWithChoices, PollServiceError> {
        let question = self.question(id).await?;
        let choices = self
            .repo
            .choices_for(id)
            .await
            .context("Failed to list choices")?;
        Ok(QuestionWithChoices { question, choices })
    }

    /// Most recently published questions, never ones dated in the future
    pub async fn latest(&self, limit: i64) -> Result<Vec<Question>, PollServiceError> {
        Ok(self
            .repo
            .latest_questions(Utc::now(), limit)
            .await
            .context("Failed to list latest questions")?)
    }

    pub async fn list_questions(&self) -> Result<Vec<Question>, PollServiceError> {
        Ok(self
            .repo
            .list_questions()
            .await
            .context("Failed to list questions")?)
    }

    pub async fn list_choices(&self) -> Result<Vec<Choice>, PollServiceError> {
        Ok(self
            .repo
            .list_choices()
            .await
            .context("Failed to list choices")?)
    }

    /// Count one vote and return the updated results
    pub async fn vote(
        &self,
        question_id: i64,
        choice_id: i64,
    ) -> Result<QuestionWithChoices, PollServiceError> {
        let counted = self
            .repo
            .vote(question_id, choice_id)
            .await
            .context("Failed to record vote")?;

        if !counted {
            // Tell a missing question apart from a foreign choice
            self.question(question_id).await?;
            return Err(PollServiceError::ChoiceNotFound {
                question_id,
                choice_id,
            });
        }

        tracing::debug!("Vote for choice {} on question {}", choice_id, question_id);
        self.get(question_id).await
    }

    async fn question(&self, id: i64) -> Result<Question, PollServiceError> {
        self.repo
            .get_question(id)
            .await
            .context("Failed to get question")?
            .ok_or(PollServiceError::QuestionNotFound(id))
    }
}

fn validate_text(what: &str, text: &str) -> Result<String, PollServiceError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(PollServiceError::ValidationError(format!(
            "{} cannot be empty",
            what
        )));
    }
    if text.chars().count() > POLL_TEXT_MAX_LEN {
        return Err(PollServiceError::ValidationError(format!(
            "{} must be at most {} characters",
            what, POLL_TEXT_MAX_LEN
        )));
    }
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxPollRepository;
    use crate::db::{create_test_pool, migrations};
    use chrono::Duration;

    async fn setup_test_service() -> PollService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        PollService::new(SqlxPollRepository::boxed(pool))
    }

    fn question(text: &str, choices: &[&str]) -> CreateQuestionInput {
        CreateQuestionInput {
            question_text: text.to_string(),
            pub_date: None,
            choices: choices.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let service = setup_test_service().await;
        let created = service
            .create_question(question("What's up?", &["Not much", "The sky"]))
            .await
            .unwrap();
        assert_eq!(created.choices.len(), 2);
        assert!(created.question.was_published_recently());

        let fetched = service.get(created.question.id).await.unwrap();
        assert_eq!(fetched.question.question_text, "What's up?");
        assert_eq!(fetched.choices, created.choices);
        assert_eq!(fetched.total_votes(), 0);
    }

    #[tokio::test]
    async fn test_vote_increments() {
        let service = setup_test_service().await;
        let created = service
            .create_question(question("Tabs or spaces?", &["Tabs", "Spaces"]))
            .await
            .unwrap();
        let spaces = created.choices[1].id;

        service.vote(created.question.id, spaces).await.unwrap();
        let results = service.vote(created.question.id, spaces).await.unwrap();

        assert_eq!(results.choices[1].votes, 2);
        assert_eq!(results.choices[0].votes, 0);
        assert_eq!(results.total_votes(), 2);
    }

    #[tokio::test]
    async fn test_vote_errors() {
        let service = setup_test_service().await;
        let first = service
            .create_question(question("First?", &["Yes"]))
            .await
            .unwrap();
        let second = service
            .create_question(question("Second?", &["No"]))
            .await
            .unwrap();

        let foreign = service
            .vote(first.question.id, second.choices[0].id)
            .await;
        assert!(matches!(foreign, Err(PollServiceError::ChoiceNotFound { .. })));

        let missing = service.vote(999, first.choices[0].id).await;
        assert!(matches!(missing, Err(PollServiceError::QuestionNotFound(999))));
    }

    #[tokio::test]
    async fn test_latest_skips_future_questions() {
        let service = setup_test_service().await;
        service.create_question(question("Now?", &[])).await.unwrap();
        service
            .create_question(CreateQuestionInput {
                question_text: "Later?".to_string(),
                pub_date: Some(Utc::now() + Duration::days(30)),
                choices: vec![],
            })
            .await
            .unwrap();

        let latest = service.latest(LATEST_QUESTIONS).await.unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].question_text, "Now?");
        assert_eq!(service.list_questions().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_validation() {
        let service = setup_test_service().await;
        let empty = service.create_question(question("  ", &[])).await;
        assert!(matches!(empty, Err(PollServiceError::ValidationError(_))));

        let long_choice = "c".repeat(POLL_TEXT_MAX_LEN + 1);
        let bad_choice = service
            .create_question(question("Fine?", &[long_choice.as_str()]))
            .await;
        assert!(matches!(bad_choice, Err(PollServiceError::ValidationError(_))));
    }
}
