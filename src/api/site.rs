//! Public site endpoints
//!
//! - GET /api/v1/health - Liveness and database reachability
//! - GET /api/v1/prompt - Random writing prompt for brainstorming

use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState};

pub const SUPERLATIVES: [&str; 4] = ["First", "Last", "Best", "Worst"];
pub const SUBJECTS: [&str; 6] = ["job", "vacation", "goodbye", "car", "mistake", "watch"];

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PromptResponse {
    pub superlative: String,
    pub subject: String,
    pub prompt: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/prompt", get(writing_prompt))
}

/// GET /api/v1/health
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match state.pool.ping().await {
        Ok(()) => "ok",
        Err(e) => {
            tracing::warn!("Health check: database unavailable: {}", e);
            "unavailable"
        }
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        database: database.to_string(),
    })
}

/// GET /api/v1/prompt
async fn writing_prompt() -> Result<Json<PromptResponse>, ApiError> {
    let mut seed = [0u8; 2];
    getrandom::fill(&mut seed)
        .map_err(|e| ApiError::internal_error(format!("Random source unavailable: {}", e)))?;

    Ok(Json(pick_prompt(seed[0], seed[1])))
}

fn pick_prompt(a: u8, b: u8) -> PromptResponse {
    let superlative = SUPERLATIVES[a as usize % SUPERLATIVES.len()];
    let subject = SUBJECTS[b as usize % SUBJECTS.len()];
    PromptResponse {
        superlative: superlative.to_string(),
        subject: subject.to_string(),
        prompt: format!("{} {}", superlative, subject),
    }
}
