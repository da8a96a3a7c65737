//! Story model
//!
//! A story is a short journal entry owned by exactly one user. The `analysis`
//! field is filled in by the analysis pipeline and otherwise left alone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Emotional impact assigned when the author doesn't pick one
pub const DEFAULT_EMOTIONAL_IMPACT: &str = "medium";

/// Story entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    pub id: i64,
    pub title: String,
    /// Free-text date as entered by the author ("last summer", "2024-03-02")
    pub date: String,
    pub content: String,
    /// Comma-separated tags
    pub tags: String,
    pub emotional_impact: String,
    /// Latest AI analysis, plain text or serialized JSON
    pub analysis: Option<String>,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Story {
    /// Build an unsaved story for `owner_id` from validated input
    pub fn new(owner_id: i64, input: CreateStoryInput) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            title: input.title,
            date: input.date,
            content: input.content,
            tags: input.tags.unwrap_or_default(),
            emotional_impact: input
                .emotional_impact
                .unwrap_or_else(|| DEFAULT_EMOTIONAL_IMPACT.to_string()),
            analysis: None,
            owner_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Input for creating a story
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateStoryInput {
    pub title: String,
    pub date: String,
    pub content: String,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub emotional_impact: Option<String>,
}

/// Partial story update; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateStoryInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub emotional_impact: Option<String>,
}

impl UpdateStoryInput {
    /// Apply the present fields onto `story`
    pub fn apply_to(self, story: &mut Story) {
        if let Some(title) = self.title {
            story.title = title;
        }
        if let Some(date) = self.date {
            story.date = date;
        }
        if let Some(content) = self.content {
            story.content = content;
        }
        if let Some(tags) = self.tags {
            story.tags = tags;
        }
        if let Some(impact) = self.emotional_impact {
            story.emotional_impact = impact;
        }
        story.updated_at = Utc::now();
    }
}

/// Offset pagination with an optional search term
#[derive(Debug, Clone)]
pub struct ListParams {
    pub skip: i64,
    pub limit: i64,
    /// Case-insensitive match against title, content and tags
    pub search: Option<String>,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: 100,
            search: None,
        }
    }
}

impl ListParams {
    /// Create list parameters, clamping to sane bounds
    pub fn new(skip: i64, limit: i64, search: Option<String>) -> Self {
        Self {
            skip: skip.max(0),
            limit: limit.clamp(1, 100),
            search: search
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> CreateStoryInput {
        CreateStoryInput {
            title: "Lost keys".to_string(),
            date: "yesterday".to_string(),
            content: "I forgot my keys at the office".to_string(),
            tags: None,
            emotional_impact: None,
        }
    }

    #[test]
    fn test_new_story_defaults() {
        let story = Story::new(3, input());
        assert_eq!(story.owner_id, 3);
        assert_eq!(story.tags, "");
        assert_eq!(story.emotional_impact, DEFAULT_EMOTIONAL_IMPACT);
        assert!(story.analysis.is_none());
    }

    #[test]
    fn test_update_applies_only_present_fields() {
        let mut story = Story::new(1, input());
        UpdateStoryInput {
            title: Some("Found keys".to_string()),
            ..Default::default()
        }
        .apply_to(&mut story);

        assert_eq!(story.title, "Found keys");
        assert_eq!(story.content, "I forgot my keys at the office");
    }

    #[test]
    fn test_list_params_clamp() {
        let params = ListParams::new(-5, 1000, Some("   ".to_string()));
        assert_eq!(params.skip, 0);
        assert_eq!(params.limit, 100);
        assert!(params.search.is_none());

        let params = ListParams::new(10, 0, Some(" keys ".to_string()));
        assert_eq!(params.limit, 1);
        assert_eq!(params.search.as_deref(), Some("keys"));
    }
}
