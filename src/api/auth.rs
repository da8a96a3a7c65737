//! Authentication API endpoints
//!
//! Handles HTTP requests for user authentication:
//! - POST /api/v1/auth/register - User registration
//! - POST /api/v1/auth/login - User login
//! - POST /api/v1/auth/logout - User logout
//! - GET /api/v1/auth/me - Get current user

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use crate::api::middleware::{extract_session_token, ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{TokenResponse, UserResponse};
use crate::services::user::{LoginInput, RegisterInput, UserServiceError};

/// Request body for user registration
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
}

/// Request body for user login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Build protected auth routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(get_current_user))
}

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

/// Map user service failures onto API errors
pub(crate) fn user_error(e: UserServiceError) -> ApiError {
    match e {
        UserServiceError::AuthenticationError(msg) => ApiError::unauthorized(msg),
        UserServiceError::ValidationError(msg) => ApiError::validation_error(msg),
        UserServiceError::UserExists(msg) => ApiError::conflict(msg),
        UserServiceError::InactiveUser => ApiError::new("INACTIVE_USER", "Inactive user"),
        UserServiceError::NotFound => ApiError::not_found("User not found"),
        UserServiceError::InternalError(e) => ApiError::internal_error(e.to_string()),
    }
}

/// POST /api/v1/auth/register - User registration
async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .user_service
        .register(RegisterInput {
            email: body.email,
            password: body.password,
            full_name: body.full_name,
        })
        .await
        .map_err(user_error)?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// POST /api/v1/auth/login - User login
///
/// Returns the session token in the body and as an HttpOnly cookie.
async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (session, user) = state
        .user_service
        .login(LoginInput {
            email: body.email,
            password: body.password,
        })
        .await
        .map_err(user_error)?;

    let max_age = (session.expires_at - Utc::now()).num_seconds().max(0);
    let cookie = format!(
        "session={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        session.id, max_age
    );

    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie)
            .map_err(|e| ApiError::internal_error(format!("Invalid cookie: {}", e)))?,
    );

    tracing::info!(user_id = user.id, "User logged in");

    Ok((
        headers,
        Json(TokenResponse {
            access_token: session.id,
            token_type: "bearer".to_string(),
            expires_at: session.expires_at.to_rfc3339(),
            user: user.into(),
        }),
    ))
}

/// POST /api/v1/auth/logout - User logout
///
/// Requires authentication.
async fn logout(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = extract_session_token(&headers)
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    state
        .user_service
        .logout(&token)
        .await
        .map_err(user_error)?;

    let clear_cookie = "session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0";
    let mut response_headers = HeaderMap::new();
    response_headers.insert(header::SET_COOKIE, HeaderValue::from_static(clear_cookie));

    Ok((StatusCode::NO_CONTENT, response_headers))
}

/// GET /api/v1/auth/me - Get current user
async fn get_current_user(user: AuthenticatedUser) -> Json<UserResponse> {
    Json(user.0.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_error_mapping() {
        assert_eq!(
            user_error(UserServiceError::AuthenticationError("bad".into())).error.code,
            "UNAUTHORIZED"
        );
        assert_eq!(
            user_error(UserServiceError::UserExists("dup".into())).error.code,
            "CONFLICT"
        );
        let inactive = user_error(UserServiceError::InactiveUser);
        assert_eq!(inactive.status(), StatusCode::BAD_REQUEST);
        assert_eq!(inactive.error.message, "Inactive user");
        assert_eq!(user_error(UserServiceError::NotFound).status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_login_request_deserialization() {
        let body: LoginRequest =
            serde_json::from_str(r#"{"email":"a@example.com","password":"secret123"}"#).unwrap();
        assert_eq!(body.email, "a@example.com");
    }
}
