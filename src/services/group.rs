//! Group service

use crate::db::repositories::{GroupRepository, PersonRepository};
use crate::models::{CreateGroupInput, Group, GroupWithMemberCount};
use crate::services::slug::{base_slug, is_valid_slug, slug_candidates};
use anyhow::Context;
use std::sync::Arc;

const SLUG_FALLBACK: &str = "group";

/// Default size of `top_by_member_count()`
pub const TOP_GROUPS: i64 = 10;

/// Error types for group service operations
#[derive(Debug, thiserror::Error)]
pub enum GroupServiceError {
    #[error("Group name already exists: {0}")]
    DuplicateName(String),

    #[error("Group slug already exists: {0}")]
    DuplicateSlug(String),

    #[error("Group not found: {0}")]
    NotFound(String),

    #[error("Person not found: {0}")]
    PersonNotFound(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Group service
pub struct GroupService {
    repo: Arc<dyn GroupRepository>,
    people: Arc<dyn PersonRepository>,
}

impl GroupService {
    pub fn new(repo: Arc<dyn GroupRepository>, people: Arc<dyn PersonRepository>) -> Self {
        Self { repo, people }
    }

    /// Create a group; the slug follows the same rules as post slugs
    pub async fn create(&self, input: CreateGroupInput) -> Result<Group, GroupServiceError> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(GroupServiceError::ValidationError(
                "Group name cannot be empty".to_string(),
            ));
        }
        if self
            .repo
            .name_taken(&name)
            .await
            .context("Failed to check group name")?
        {
            return Err(GroupServiceError::DuplicateName(name));
        }

        let slug = match input.slug.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(slug) => {
                if !is_valid_slug(slug) {
                    return Err(GroupServiceError::ValidationError(format!(
                        "Invalid slug: '{}'",
                        slug
                    )));
                }
                if self
                    .repo
                    .slug_taken(slug)
                    .await
                    .context("Failed to check group slug")?
                {
                    return Err(GroupServiceError::DuplicateSlug(slug.to_string()));
                }
                slug.to_string()
            }
            None => self.free_slug(&base_slug(&name, SLUG_FALLBACK)).await?,
        };

        Ok(self
            .repo
            .create(&name, &slug)
            .await
            .context("Failed to create group")?)
    }

    async fn free_slug(&self, base: &str) -> Result<String, GroupServiceError> {
        let mut candidates = slug_candidates(base);
        loop {
            let candidate = candidates
                .next()
                .context("Ran out of slug candidates")?;
            if !self
                .repo
                .slug_taken(&candidate)
                .await
                .context("Failed to check group slug")?
            {
                return Ok(candidate);
            }
        }
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Group, GroupServiceError> {
        self.repo
            .get_by_slug(slug)
            .await
            .context("Failed to get group")?
            .ok_or_else(|| GroupServiceError::NotFound(slug.to_string()))
    }

    pub async fn list(&self) -> Result<Vec<Group>, GroupServiceError> {
        Ok(self.repo.list().await.context("Failed to list groups")?)
    }

    /// Add a person to the group named by `slug`
    pub async fn add_member(&self, slug: &str, person_id: i64) -> Result<(), GroupServiceError> {
        let group = self.get_by_slug(slug).await?;
        if self
            .people
            .get_by_id(person_id)
            .await
            .context("Failed to get person")?
            .is_none()
        {
            return Err(GroupServiceError::PersonNotFound(person_id));
        }
        self.repo
            .add_member(group.id, person_id)
            .await
            .context("Failed to add group member")?;
        Ok(())
    }

    /// Returns whether the person was a member
    pub async fn remove_member(&self, slug: &str, person_id: i64) -> Result<bool, GroupServiceError> {
        let group = self.get_by_slug(slug).await?;
        Ok(self
            .repo
            .remove_member(group.id, person_id)
            .await
            .context("Failed to remove group member")?)
    }

    pub async fn member_ids(&self, slug: &str) -> Result<Vec<i64>, GroupServiceError> {
        let group = self.get_by_slug(slug).await?;
        Ok(self
            .repo
            .member_ids(group.id)
            .await
            .context("Failed to list group members")?)
    }

    /// Largest groups first
    pub async fn top_by_member_count(
        &self,
        limit: i64,
    ) -> Result<Vec<GroupWithMemberCount>, GroupServiceError> {
        Ok(self
            .repo
            .top_by_member_count(limit)
            .await
            .context("Failed to rank groups")?)
    }
}
