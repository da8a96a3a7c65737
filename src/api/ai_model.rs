//! AI model configuration API endpoints
//!
//! - GET /api/v1/ai-model - Caller's configuration
//! - PUT /api/v1/ai-model - Create or update it
//! - GET /api/v1/ai-model/available-models - Models on the local server

use axum::{extract::State, routing::get, Json, Router};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::AiModelResponse;
use crate::models::{AiProvider, ApiKeyChange, AvailableModel, UpsertAiModelInput};
use crate::services::AiModelServiceError;

/// Request body for PUT /ai-model
///
/// `api_key` absent keeps the stored key, an empty string clears it.
#[derive(Debug, Deserialize)]
pub struct UpsertAiModelRequest {
    pub provider: String,
    pub model_name: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(read_ai_model).put(upsert_ai_model))
        .route("/available-models", get(available_models))
}

fn ai_model_error(e: AiModelServiceError) -> ApiError {
    match e {
        AiModelServiceError::ValidationError(msg) => ApiError::validation_error(msg),
        AiModelServiceError::Secret(e) => ApiError::internal_error(e.to_string()),
        AiModelServiceError::InternalError(e) => ApiError::internal_error(e.to_string()),
    }
}

async fn read_ai_model(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<AiModelResponse>, ApiError> {
    let config = state
        .ai_model_service
        .get(user.0.id)
        .await
        .map_err(ai_model_error)?
        .ok_or_else(|| ApiError::not_found("AI model settings not found"))?;
    Ok(Json(config.into()))
}

async fn upsert_ai_model(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<UpsertAiModelRequest>,
) -> Result<Json<AiModelResponse>, ApiError> {
    let provider: AiProvider = body
        .provider
        .parse()
        .map_err(|e: anyhow::Error| ApiError::validation_error(e.to_string()))?;

    let input = UpsertAiModelInput {
        provider,
        model_name: body.model_name,
        api_key: ApiKeyChange::from_request(body.api_key),
    };

    let saved = state
        .ai_model_service
        .upsert(user.0.id, input)
        .await
        .map_err(ai_model_error)?;
    Ok(Json(saved.into()))
}

async fn available_models(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<Vec<AvailableModel>>, ApiError> {
    let models = state
        .analysis_service
        .available_models()
        .await
        .map_err(|e| {
            tracing::warn!("Failed to list local models: {}", e);
            ApiError::service_unavailable(e.to_string())
        })?;
    Ok(Json(models))
}
