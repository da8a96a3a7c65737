//! User service
//!
//! Registration, login/logout, session validation and account management.
//! Emails are stored trimmed and lowercased, so lookups are case-insensitive.

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{CreateUserInput, Session, UpdateUserInput, User};
use crate::services::password::{hash_password, validate_password, verify_password};
use anyhow::Context;
use chrono::Duration;
use std::sync::Arc;

/// Default session lifetime in days
pub const DEFAULT_SESSION_EXPIRATION_DAYS: i64 = 8;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Invalid credentials
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("Inactive user")]
    InactiveUser,

    #[error("User not found")]
    NotFound,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Registration input
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
}

/// Login input
#[derive(Debug, Clone)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

/// User service for managing users and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_lifetime: Duration,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
    ) -> Self {
        Self::with_session_expiration(user_repo, session_repo, DEFAULT_SESSION_EXPIRATION_DAYS)
    }

    /// Create a user service with a custom session lifetime
    pub fn with_session_expiration(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        session_expiration_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_lifetime: Duration::days(session_expiration_days),
        }
    }

    /// Register a new regular account
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        self.create_user(CreateUserInput {
            email: input.email,
            password: input.password,
            full_name: input.full_name,
            is_superuser: false,
        })
        .await
    }

    /// Create an account, optionally as superuser
    pub async fn create_user(&self, input: CreateUserInput) -> Result<User, UserServiceError> {
        let email = normalize_email(&input.email)?;
        validate_password(&input.password).map_err(UserServiceError::ValidationError)?;

        if self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to check existing email")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Email '{}' is already registered",
                email
            )));
        }

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;
        let mut user = User::new(email, password_hash, clean_optional(input.full_name));
        user.is_superuser = input.is_superuser;

        let created = self
            .user_repo
            .create(&user)
            .await
            .context("Failed to create user")?;

        tracing::info!(user_id = created.id, superuser = created.is_superuser, "User registered");
        Ok(created)
    }

    /// Check credentials and open a session
    pub async fn login(&self, input: LoginInput) -> Result<(Session, User), UserServiceError> {
        let invalid = || {
            UserServiceError::AuthenticationError("Incorrect email or password".to_string())
        };

        let email = input.email.trim().to_lowercase();
        let user = self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to look up user")?
            .ok_or_else(invalid)?;

        let valid = verify_password(&input.password, &user.password_hash)
            .context("Failed to verify password")?;
        if !valid {
            tracing::debug!(user_id = user.id, "Login rejected: bad password");
            return Err(invalid());
        }

        if !user.is_active {
            return Err(UserServiceError::InactiveUser);
        }

        let session = Session::new(user.id, self.session_lifetime);
        self.session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;

        Ok((session, user))
    }

    /// Invalidate a session token
    pub async fn logout(&self, session_id: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(session_id)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Resolve a session token to its user.
    ///
    /// Unknown and expired tokens yield `None`; expired sessions are removed.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let session = match self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(s) => s,
            None => return Ok(None),
        };

        if session.is_expired() {
            if let Err(e) = self.session_repo.delete(token).await {
                tracing::warn!("Failed to delete expired session: {:#}", e);
            }
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;

        Ok(user.filter(|u| u.is_active))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        let user = self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?;
        Ok(user)
    }

    pub async fn list(&self, skip: i64, limit: i64) -> Result<Vec<User>, UserServiceError> {
        let users = self
            .user_repo
            .list(skip.max(0), limit.clamp(1, 100))
            .await
            .context("Failed to list users")?;
        Ok(users)
    }

    /// Apply a partial update to a user
    ///
    /// `is_active` and `is_superuser` are honoured as given; callers decide
    /// whether the acting user may change them.
    pub async fn update(&self, id: i64, input: UpdateUserInput) -> Result<User, UserServiceError> {
        let mut user = self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?
            .ok_or(UserServiceError::NotFound)?;

        if let Some(email) = input.email {
            let email = normalize_email(&email)?;
            if email != user.email {
                let taken = self
                    .user_repo
                    .get_by_email(&email)
                    .await
                    .context("Failed to check existing email")?;
                if taken.is_some() {
                    return Err(UserServiceError::UserExists(format!(
                        "Email '{}' is already registered",
                        email
                    )));
                }
                user.email = email;
            }
        }

        if let Some(password) = input.password {
            validate_password(&password).map_err(UserServiceError::ValidationError)?;
            user.password_hash = hash_password(&password).context("Failed to hash password")?;
        }

        if let Some(full_name) = input.full_name {
            user.full_name = clean_optional(Some(full_name));
        }
        if let Some(display_name) = input.display_name {
            user.display_name = clean_optional(Some(display_name));
        }
        if let Some(theme) = input.theme {
            user.theme = theme;
        }
        if let Some(is_active) = input.is_active {
            user.is_active = is_active;
        }
        if let Some(is_superuser) = input.is_superuser {
            user.is_superuser = is_superuser;
        }

        let updated = self
            .user_repo
            .update(&user)
            .await
            .context("Failed to update user")?;
        Ok(updated)
    }

    /// Delete a user and, through cascades, everything they own
    pub async fn delete(&self, id: i64) -> Result<(), UserServiceError> {
        if self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?
            .is_none()
        {
            return Err(UserServiceError::NotFound);
        }

        self.user_repo
            .delete(id)
            .await
            .context("Failed to delete user")?;

        tracing::info!(user_id = id, "User deleted");
        Ok(())
    }

    /// Create the configured superuser if no account with that email exists
    ///
    /// Returns the new user, or `None` when the account was already present.
    pub async fn ensure_superuser(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, UserServiceError> {
        let email = normalize_email(email)?;
        if self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to check existing email")?
            .is_some()
        {
            return Ok(None);
        }

        let user = self
            .create_user(CreateUserInput {
                email,
                password: password.to_string(),
                full_name: Some("Administrator".to_string()),
                is_superuser: true,
            })
            .await?;

        Ok(Some(user))
    }

    /// Remove expired sessions, returning how many were deleted
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, UserServiceError> {
        let count = self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to clean up expired sessions")?;
        Ok(count)
    }
}

fn normalize_email(email: &str) -> Result<String, UserServiceError> {
    let email = email.trim().to_lowercase();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
    if !valid || email.len() > 255 {
        return Err(UserServiceError::ValidationError(
            "A valid email address is required".to_string(),
        ));
    }
    Ok(email)
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
