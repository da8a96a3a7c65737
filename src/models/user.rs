//! User model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A registered StoryCraft account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Email address (unique, used to log in)
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: Option<String>,
    /// Name shown in the journal header; falls back to the full name
    pub display_name: Option<String>,
    pub theme: Theme,
    pub is_active: bool,
    pub is_superuser: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new active, non-superuser account.
    ///
    /// The password must already be hashed, see `services::password::hash_password()`.
    pub fn new(email: String, password_hash: String, full_name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            email,
            password_hash,
            full_name,
            display_name: None,
            theme: Theme::default(),
            is_active: true,
            is_superuser: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// UI colour scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Light => write!(f, "light"),
            Theme::Dark => write!(f, "dark"),
        }
    }
}

impl FromStr for Theme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            _ => Err(anyhow::anyhow!("Invalid theme: {}", s)),
        }
    }
}

/// Input for creating a new user (before password hashing)
#[derive(Debug, Clone, Default)]
pub struct CreateUserInput {
    pub email: String,
    /// Plaintext password (will be hashed)
    pub password: String,
    pub full_name: Option<String>,
    pub is_superuser: bool,
}

/// Input for updating a user; `None` leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct UpdateUserInput {
    pub email: Option<String>,
    /// New password (will be hashed)
    pub password: Option<String>,
    pub full_name: Option<String>,
    pub display_name: Option<String>,
    pub theme: Option<Theme>,
    pub is_active: Option<bool>,
    pub is_superuser: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_new() {
        let user = User::new(
            "writer@example.com".to_string(),
            "hashed_password".to_string(),
            Some("Ada Writer".to_string()),
        );

        assert_eq!(user.id, 0);
        assert_eq!(user.email, "writer@example.com");
        assert_eq!(user.theme, Theme::Light);
        assert!(user.is_active);
        assert!(!user.is_superuser);
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User::new("writer@example.com".to_string(), "secret-hash".to_string(), None);
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(json.contains("\"theme\":\"light\""));
    }

    #[test]
    fn test_theme_from_str() {
        assert_eq!(Theme::from_str("dark").unwrap(), Theme::Dark);
        assert_eq!(Theme::from_str("LIGHT").unwrap(), Theme::Light);
        assert!(Theme::from_str("sepia").is_err());
        assert_eq!(Theme::Dark.to_string(), "dark");
    }
}
