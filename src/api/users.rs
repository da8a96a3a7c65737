//! User management API endpoints
//!
//! - GET/PUT /api/v1/users/me - Own profile
//! - GET /api/v1/users - List users (superuser)
//! - GET/PUT/DELETE /api/v1/users/{id} - Manage a user (superuser)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::auth::user_error;
use crate::api::common::SkipLimitQuery;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::UserResponse;
use crate::models::{Theme, UpdateUserInput};

/// Profile fields a user may change on their own account
#[derive(Debug, Deserialize)]
pub struct UpdateMeRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub full_name: Option<String>,
    pub display_name: Option<String>,
    pub theme: Option<Theme>,
}

/// Superuser update; may also toggle account flags
#[derive(Debug, Deserialize)]
pub struct AdminUpdateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub full_name: Option<String>,
    pub display_name: Option<String>,
    pub theme: Option<Theme>,
    pub is_active: Option<bool>,
    pub is_superuser: Option<bool>,
}

/// Routes for the caller's own account
pub fn me_router() -> Router<AppState> {
    Router::new().route("/me", get(read_me).put(update_me))
}

/// Superuser-only routes (requires superuser middleware)
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route("/{id}", get(read_user).put(update_user).delete(delete_user))
}

async fn read_me(user: AuthenticatedUser) -> Json<UserResponse> {
    Json(user.0.into())
}

async fn update_me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<UpdateMeRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let input = UpdateUserInput {
        email: body.email,
        password: body.password,
        full_name: body.full_name,
        display_name: body.display_name,
        theme: body.theme,
        ..Default::default()
    };

    let updated = state
        .user_service
        .update(user.0.id, input)
        .await
        .map_err(user_error)?;
    Ok(Json(updated.into()))
}

async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<SkipLimitQuery>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = state
        .user_service
        .list(query.skip.max(0), query.limit.clamp(1, 100))
        .await
        .map_err(user_error)?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

async fn read_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state
        .user_service
        .get_by_id(id)
        .await
        .map_err(user_error)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(user.into()))
}

async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<AdminUpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let input = UpdateUserInput {
        email: body.email,
        password: body.password,
        full_name: body.full_name,
        display_name: body.display_name,
        theme: body.theme,
        is_active: body.is_active,
        is_superuser: body.is_superuser,
    };

    let updated = state
        .user_service
        .update(id, input)
        .await
        .map_err(user_error)?;
    Ok(Json(updated.into()))
}

async fn delete_user(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if admin.0.id == id {
        return Err(ApiError::validation_error(
            "Super users are not allowed to delete themselves",
        ));
    }

    state.user_service.delete(id).await.map_err(user_error)?;
    Ok(StatusCode::NO_CONTENT)
}
