//! Person service
//!
//! Query helpers over people:
//! - active / inactive filters
//! - case-insensitive name search
//! - post-count annotation and the `polls_post_counts` view
//! - people outside every group
//! - creation-year and last-name regex filters

use crate::db::repositories::PersonRepository;
use crate::models::{CreatePersonInput, Person, PersonStatus, PersonWithPostCount, PostCount};
use crate::services::forms::FormErrors;
use crate::services::period::year_range;
use anyhow::Context;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::Arc;
use validator::Validate;

/// Upper bound on people returned by the list endpoints
pub const PEOPLE_LIMIT: i64 = 50;

/// Error types for person service operations
#[derive(Debug, thiserror::Error)]
pub enum PersonServiceError {
    /// Email already used by another person
    #[error("Email already exists: {0}")]
    DuplicateEmail(String),

    /// Person not found
    #[error("Person not found: {0}")]
    NotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Last-name pattern is not a valid regular expression
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// People created during one calendar year
#[derive(Debug, Clone)]
pub struct PeopleByYear {
    pub year: i32,
    /// Total for the year, may exceed `people.len()`
    pub count: i64,
    pub people: Vec<Person>,
    pub from: DateTime<Utc>,
}

/// Person service
pub struct PersonService {
    repo: Arc<dyn PersonRepository>,
}

impl PersonService {
    pub fn new(repo: Arc<dyn PersonRepository>) -> Self {
        Self { repo }
    }

    /// Create a person after checking field rules and email uniqueness
    pub async fn create(&self, input: CreatePersonInput) -> Result<Person, PersonServiceError> {
        let input = CreatePersonInput {
            first_name: input.first_name.trim().to_string(),
            last_name: input.last_name.trim().to_string(),
            email: input.email.trim().to_string(),
            ..input
        };

        if let Err(errors) = input.validate() {
            return Err(PersonServiceError::ValidationError(
                FormErrors::from(errors).to_string(),
            ));
        }

        if self
            .repo
            .exists_by_email(&input.email)
            .await
            .context("Failed to check email uniqueness")?
        {
            return Err(PersonServiceError::DuplicateEmail(input.email));
        }

        let person = self.repo.create(&input).await.context("Failed to create person")?;
        tracing::debug!("Created person {} ({})", person.id, person);
        Ok(person)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Person, PersonServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get person")?
            .ok_or_else(|| PersonServiceError::NotFound(format!("Person with ID {} not found", id)))
    }

    /// Everyone, in default order (last name, first name, status)
    pub async fn list(&self) -> Result<Vec<Person>, PersonServiceError> {
        Ok(self.repo.list().await.context("Failed to list people")?)
    }

    /// People with status `AC`
    pub async fn active(&self, limit: i64) -> Result<Vec<Person>, PersonServiceError> {
        self.by_status(PersonStatus::Active, limit).await
    }

    /// People with status `IN`
    pub async fn inactive(&self, limit: i64) -> Result<Vec<Person>, PersonServiceError> {
        self.by_status(PersonStatus::Inactive, limit).await
    }

    async fn by_status(
        &self,
        status: PersonStatus,
        limit: i64,
    ) -> Result<Vec<Person>, PersonServiceError> {
        Ok(self
            .repo
            .list_by_status(status, limit)
            .await
            .context("Failed to list people by status")?)
    }

    /// Case-insensitive substring match on first or last name.
    ///
    /// An empty term matches everyone.
    pub async fn search(&self, term: &str, limit: i64) -> Result<Vec<Person>, PersonServiceError> {
        Ok(self
            .repo
            .search(term.trim(), limit)
            .await
            .context("Failed to search people")?)
    }

    pub async fn with_post_counts(&self) -> Result<Vec<PersonWithPostCount>, PersonServiceError> {
        Ok(self
            .repo
            .with_post_counts()
            .await
            .context("Failed to count posts per person")?)
    }

    pub async fn without_groups(&self, limit: i64) -> Result<Vec<Person>, PersonServiceError> {
        Ok(self
            .repo
            .without_groups(limit)
            .await
            .context("Failed to list people without groups")?)
    }

    /// People whose `created_at` falls in `year` (UTC)
    pub async fn created_in_year(
        &self,
        year: i32,
        limit: i64,
    ) -> Result<PeopleByYear, PersonServiceError> {
        let (start, end) = year_range(year).ok_or_else(|| {
            PersonServiceError::ValidationError(format!("Year out of range: {}", year))
        })?;

        let count = self
            .repo
            .count_created_between(start, end)
            .await
            .context("Failed to count people by year")?;
        let people = self
            .repo
            .created_between(start, end, limit)
            .await
            .context("Failed to list people by year")?;

        Ok(PeopleByYear {
            year,
            count,
            people,
            from: start,
        })
    }

    /// People whose last name matches `pattern` anywhere (unanchored search)
    pub async fn last_name_matches(
        &self,
        pattern: &str,
        limit: usize,
    ) -> Result<Vec<Person>, PersonServiceError> {
        let re = Regex::new(pattern)
            .map_err(|e| PersonServiceError::InvalidPattern(e.to_string()))?;

        let people = self.repo.list().await.context("Failed to list people")?;
        Ok(people
            .into_iter()
            .filter(|p| re.is_match(&p.last_name))
            .take(limit)
            .collect())
    }

    /// Rows of the `polls_post_counts` view
    pub async fn post_counts(&self) -> Result<Vec<PostCount>, PersonServiceError> {
        Ok(self
            .repo
            .post_counts()
            .await
            .context("Failed to read post counts")?)
    }

    pub async fn set_status(
        &self,
        id: i64,
        status: PersonStatus,
    ) -> Result<Person, PersonServiceError> {
        let updated = self
            .repo
            .update_status(id, status)
            .await
            .context("Failed to update person status")?;
        if !updated {
            return Err(PersonServiceError::NotFound(format!("Person with ID {} not found", id)));
        }
        self.get_by_id(id).await
    }

    /// Delete a person; their posts go with them
    pub async fn delete(&self, id: i64) -> Result<(), PersonServiceError> {
        let deleted = self.repo.delete(id).await.context("Failed to delete person")?;
        if !deleted {
            return Err(PersonServiceError::NotFound(format!("Person with ID {} not found", id)));
        }
        Ok(())
    }
}
