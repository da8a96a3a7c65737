//! Story service
//!
//! CRUD for a user's own stories plus persisting analysis results.

use crate::db::repositories::StoryRepository;
use crate::models::{
    CreateStoryInput, ListParams, Story, UpdateStoryInput, DEFAULT_EMOTIONAL_IMPACT,
};
use anyhow::Context;
use std::sync::Arc;

pub const MAX_TITLE_LENGTH: usize = 100;
pub const MIN_CONTENT_LENGTH: usize = 10;
pub const MAX_TAGS_LENGTH: usize = 200;
pub const MAX_EMOTIONAL_IMPACT_LENGTH: usize = 20;

/// Error types for story service operations
#[derive(Debug, thiserror::Error)]
pub enum StoryServiceError {
    #[error("Story not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Story service
pub struct StoryService {
    repo: Arc<dyn StoryRepository>,
}

impl StoryService {
    pub fn new(repo: Arc<dyn StoryRepository>) -> Self {
        Self { repo }
    }

    pub async fn create(
        &self,
        owner_id: i64,
        input: CreateStoryInput,
    ) -> Result<Story, StoryServiceError> {
        let input = CreateStoryInput {
            title: input.title.trim().to_string(),
            date: input.date.trim().to_string(),
            content: input.content,
            tags: input.tags.map(|t| normalize_tags(&t)),
            emotional_impact: input
                .emotional_impact
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty()),
        };

        validate_title(&input.title)?;
        validate_date(&input.date)?;
        validate_content(&input.content)?;
        if let Some(tags) = &input.tags {
            validate_tags(tags)?;
        }
        if let Some(impact) = &input.emotional_impact {
            validate_emotional_impact(impact)?;
        }

        let story = self
            .repo
            .create(&Story::new(owner_id, input))
            .await
            .context("Failed to create story")?;

        tracing::debug!(story_id = story.id, owner_id, "Story created");
        Ok(story)
    }

    /// Fetch one of the owner's stories
    pub async fn get(&self, owner_id: i64, id: i64) -> Result<Story, StoryServiceError> {
        self.repo
            .get_for_owner(id, owner_id)
            .await
            .context("Failed to get story")?
            .ok_or(StoryServiceError::NotFound)
    }

    /// List the owner's stories, newest first
    pub async fn list(
        &self,
        owner_id: i64,
        params: &ListParams,
    ) -> Result<Vec<Story>, StoryServiceError> {
        let stories = self
            .repo
            .list_by_owner(owner_id, params)
            .await
            .context("Failed to list stories")?;
        Ok(stories)
    }

    /// Apply a partial update
    pub async fn update(
        &self,
        owner_id: i64,
        id: i64,
        input: UpdateStoryInput,
    ) -> Result<Story, StoryServiceError> {
        let mut story = self.get(owner_id, id).await?;

        let input = UpdateStoryInput {
            title: input.title.map(|t| t.trim().to_string()),
            date: input.date.map(|d| d.trim().to_string()),
            content: input.content,
            tags: input.tags.map(|t| normalize_tags(&t)),
            emotional_impact: input.emotional_impact.map(|e| {
                let e = e.trim();
                if e.is_empty() {
                    DEFAULT_EMOTIONAL_IMPACT.to_string()
                } else {
                    e.to_string()
                }
            }),
        };

        if let Some(title) = &input.title {
            validate_title(title)?;
        }
        if let Some(date) = &input.date {
            validate_date(date)?;
        }
        if let Some(content) = &input.content {
            validate_content(content)?;
        }
        if let Some(tags) = &input.tags {
            validate_tags(tags)?;
        }
        if let Some(impact) = &input.emotional_impact {
            validate_emotional_impact(impact)?;
        }

        input.apply_to(&mut story);

        let updated = self
            .repo
            .update(&story)
            .await
            .context("Failed to update story")?;
        Ok(updated)
    }

    pub async fn delete(&self, owner_id: i64, id: i64) -> Result<(), StoryServiceError> {
        let deleted = self
            .repo
            .delete(id, owner_id)
            .await
            .context("Failed to delete story")?;

        if deleted {
            Ok(())
        } else {
            Err(StoryServiceError::NotFound)
        }
    }

    /// Store an analysis result and return the refreshed story
    pub async fn set_analysis(
        &self,
        owner_id: i64,
        id: i64,
        analysis: &str,
    ) -> Result<Story, StoryServiceError> {
        let updated = self
            .repo
            .set_analysis(id, owner_id, analysis)
            .await
            .context("Failed to store analysis")?;

        if !updated {
            return Err(StoryServiceError::NotFound);
        }
        self.get(owner_id, id).await
    }
}

/// Trim each tag and drop empty ones: " a, ,b " -> "a, b"
pub fn normalize_tags(tags: &str) -> String {
    tags.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

fn validate_title(title: &str) -> Result<(), StoryServiceError> {
    let len = title.chars().count();
    if len == 0 || len > MAX_TITLE_LENGTH {
        return Err(StoryServiceError::ValidationError(format!(
            "Title must be between 1 and {} characters",
            MAX_TITLE_LENGTH
        )));
    }
    Ok(())
}

fn validate_date(date: &str) -> Result<(), StoryServiceError> {
    if date.is_empty() {
        return Err(StoryServiceError::ValidationError(
            "Date is required".to_string(),
        ));
    }
    Ok(())
}

fn validate_content(content: &str) -> Result<(), StoryServiceError> {
    if content.trim().chars().count() < MIN_CONTENT_LENGTH {
        return Err(StoryServiceError::ValidationError(format!(
            "Content must be at least {} characters",
            MIN_CONTENT_LENGTH
        )));
    }
    Ok(())
}

fn validate_tags(tags: &str) -> Result<(), StoryServiceError> {
    if tags.chars().count() > MAX_TAGS_LENGTH {
        return Err(StoryServiceError::ValidationError(format!(
            "Tags must be at most {} characters",
            MAX_TAGS_LENGTH
        )));
    }
    Ok(())
}

fn validate_emotional_impact(impact: &str) -> Result<(), StoryServiceError> {
    if impact.chars().count() > MAX_EMOTIONAL_IMPACT_LENGTH {
        return Err(StoryServiceError::ValidationError(format!(
            "Emotional impact must be at most {} characters",
            MAX_EMOTIONAL_IMPACT_LENGTH
        )));
    }
    Ok(())
}
