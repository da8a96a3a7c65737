//! Shared API response types
//!
//! Wire shapes for users, stories and AI configuration, kept apart from the
//! models so internal fields (password hashes, encrypted keys) never leak.

use serde::{Deserialize, Serialize};

use crate::models::{AiModelConfig, Story, User};

/// Public view of a user
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub full_name: Option<String>,
    pub display_name: Option<String>,
    pub theme: String,
    pub is_active: bool,
    pub is_superuser: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            display_name: user.display_name,
            theme: user.theme.to_string(),
            is_active: user.is_active,
            is_superuser: user.is_superuser,
            created_at: user.created_at.to_rfc3339(),
            updated_at: user.updated_at.to_rfc3339(),
        }
    }
}

/// Response for a successful login
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StoryResponse {
    pub id: i64,
    pub title: String,
    pub date: String,
    pub content: String,
    pub tags: String,
    pub emotional_impact: String,
    pub analysis: Option<String>,
    pub owner_id: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Story> for StoryResponse {
    fn from(story: Story) -> Self {
        Self {
            id: story.id,
            title: story.title,
            date: story.date,
            content: story.content,
            tags: story.tags,
            emotional_impact: story.emotional_impact,
            analysis: story.analysis,
            owner_id: story.owner_id,
            created_at: story.created_at.to_rfc3339(),
            updated_at: story.updated_at.to_rfc3339(),
        }
    }
}

/// A user's AI configuration; the key itself is reduced to a flag
#[derive(Debug, Serialize, Deserialize)]
pub struct AiModelResponse {
    pub id: i64,
    pub user_id: i64,
    pub provider: String,
    pub model_name: String,
    pub has_api_key: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<AiModelConfig> for AiModelResponse {
    fn from(config: AiModelConfig) -> Self {
        Self {
            has_api_key: config.has_api_key(),
            id: config.id,
            user_id: config.user_id,
            provider: config.provider,
            model_name: config.model_name,
            created_at: config.created_at.to_rfc3339(),
            updated_at: config.updated_at.to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_user_response_omits_password_hash() {
        let user = User::new("a@example.com".to_string(), "secret-hash".to_string(), None);
        let json = serde_json::to_string(&UserResponse::from(user)).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(json.contains("\"theme\":\"light\""));
    }

    #[test]
    fn test_ai_model_response_hides_key() {
        let config = AiModelConfig {
            id: 1,
            user_id: 2,
            provider: "external".to_string(),
            model_name: "gpt-4o-mini".to_string(),
            api_key: Some("c2VhbGVk".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(AiModelResponse::from(config)).unwrap();
        assert_eq!(json["has_api_key"], true);
        assert!(json.get("api_key").is_none());
        assert!(!json.to_string().contains("c2VhbGVk"));
    }
}
