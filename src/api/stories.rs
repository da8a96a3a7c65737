//! Story API endpoints
//!
//! All routes require authentication and only ever touch the caller's own
//! stories; someone else's story id answers 404.
//!
//! - GET/POST /api/v1/stories
//! - GET/PUT/DELETE /api/v1/stories/{id}
//! - POST /api/v1/stories/{id}/analyze

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::api::common::StoryListQuery;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::StoryResponse;
use crate::models::{CreateStoryInput, ListParams, UpdateStoryInput};
use crate::services::{AnalysisError, StoryServiceError};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_stories).post(create_story))
        .route("/{id}", get(read_story).put(update_story).delete(delete_story))
        .route("/{id}/analyze", post(analyze_story))
}

fn story_error(e: StoryServiceError) -> ApiError {
    match e {
        StoryServiceError::NotFound => ApiError::not_found("Story not found"),
        StoryServiceError::ValidationError(msg) => ApiError::validation_error(msg),
        StoryServiceError::InternalError(e) => ApiError::internal_error(e.to_string()),
    }
}

/// Map analysis failures: caller-fixable problems are 400, upstream ones 502
pub(crate) fn analysis_error(e: AnalysisError) -> ApiError {
    let message = e.to_string();
    match e {
        AnalysisError::CredentialRequired(_) => ApiError::new("CREDENTIAL_REQUIRED", message),
        AnalysisError::UnsupportedProvider(_) => ApiError::new("UNSUPPORTED_PROVIDER", message),
        AnalysisError::Internal(_) => ApiError::internal_error(message),
        AnalysisError::UpstreamStatus { status, .. } => ApiError::with_details(
            "ANALYSIS_FAILED",
            message,
            serde_json::json!({ "upstream_status": status }),
        ),
        AnalysisError::Timeout(_) | AnalysisError::Transport(_) | AnalysisError::Parse(_) => {
            ApiError::new("ANALYSIS_FAILED", message)
        }
    }
}

async fn list_stories(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<StoryListQuery>,
) -> Result<Json<Vec<StoryResponse>>, ApiError> {
    let params = ListParams::from(query);
    let stories = state
        .story_service
        .list(user.0.id, &params)
        .await
        .map_err(story_error)?;
    Ok(Json(stories.into_iter().map(StoryResponse::from).collect()))
}

async fn create_story(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateStoryInput>,
) -> Result<impl IntoResponse, ApiError> {
    let story = state
        .story_service
        .create(user.0.id, body)
        .await
        .map_err(story_error)?;
    Ok((StatusCode::CREATED, Json(StoryResponse::from(story))))
}

async fn read_story(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<StoryResponse>, ApiError> {
    let story = state
        .story_service
        .get(user.0.id, id)
        .await
        .map_err(story_error)?;
    Ok(Json(story.into()))
}

async fn update_story(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateStoryInput>,
) -> Result<Json<StoryResponse>, ApiError> {
    let story = state
        .story_service
        .update(user.0.id, id, body)
        .await
        .map_err(story_error)?;
    Ok(Json(story.into()))
}

async fn delete_story(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state
        .story_service
        .delete(user.0.id, id)
        .await
        .map_err(story_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/stories/{id}/analyze
///
/// Runs the analysis pipeline on the story content and stores the result.
/// On failure the story is left untouched.
async fn analyze_story(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<StoryResponse>, ApiError> {
    let owner_id = user.0.id;
    let story = state
        .story_service
        .get(owner_id, id)
        .await
        .map_err(story_error)?;

    let analysis = state
        .analysis_service
        .analyze(owner_id, &story.content)
        .await
        .map_err(analysis_error)?;

    let updated = state
        .story_service
        .set_analysis(owner_id, id, &analysis.to_stored())
        .await
        .map_err(story_error)?;

    Ok(Json(updated.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AiProvider;

    #[test]
    fn test_analysis_error_mapping() {
        let e = analysis_error(AnalysisError::CredentialRequired(AiProvider::External));
        assert_eq!(e.error.code, "CREDENTIAL_REQUIRED");
        assert_eq!(e.status(), StatusCode::BAD_REQUEST);

        let e = analysis_error(AnalysisError::UnsupportedProvider("x".into()));
        assert_eq!(e.status(), StatusCode::BAD_REQUEST);

        let e = analysis_error(AnalysisError::Timeout(120));
        assert_eq!(e.error.code, "ANALYSIS_FAILED");
        assert_eq!(e.status(), StatusCode::BAD_GATEWAY);
        assert!(e.error.message.contains("120"));
        assert!(e.error.details.is_none());

        let e = analysis_error(AnalysisError::UpstreamStatus {
            status: 429,
            body: "slow down".into(),
        });
        assert_eq!(e.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(e.error.details, Some(serde_json::json!({ "upstream_status": 429 })));

        let e = analysis_error(AnalysisError::Parse("bad json".into()));
        assert_eq!(e.status(), StatusCode::BAD_GATEWAY);
        assert!(e.error.message.contains("bad json"));
    }
}
