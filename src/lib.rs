//! StoryCraft - A personal story journal with AI feedback
//!
//! This library provides the HTTP API, persistence and story analysis
//! pipeline behind the StoryCraft application.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;

use anyhow::Context;
use std::sync::Arc;

use crate::api::AppState;
use crate::config::Config;
use crate::db::{
    repositories::{
        SqlxAiModelRepository, SqlxSessionRepository, SqlxStoryRepository, SqlxUserRepository,
    },
    DynDatabasePool,
};
use crate::services::{
    AiModelService, AnalysisService, HttpInferenceClient, InferenceClient, ProviderResolver,
    SecretCodec, StoryService, UserService,
};

/// Wire repositories and services into the shared application state
pub fn build_state(pool: DynDatabasePool, config: &Config) -> anyhow::Result<AppState> {
    let client = HttpInferenceClient::new(&config.ai).context("Failed to create inference client")?;
    build_state_with_client(pool, config, Arc::new(client))
}

/// Same as [`build_state`] with a caller-supplied inference client
pub fn build_state_with_client(
    pool: DynDatabasePool,
    config: &Config,
    client: Arc<dyn InferenceClient>,
) -> anyhow::Result<AppState> {
    let codec = SecretCodec::new(&config.security.secret_key)
        .context("Failed to initialise API key encryption")?;

    let user_repo = SqlxUserRepository::boxed(pool.clone());
    let session_repo = SqlxSessionRepository::boxed(pool.clone());
    let story_repo = SqlxStoryRepository::boxed(pool.clone());
    let ai_model_repo = SqlxAiModelRepository::boxed(pool.clone());

    let user_service = Arc::new(UserService::with_session_expiration(
        user_repo,
        session_repo,
        config.security.session_expiration_days,
    ));
    let story_service = Arc::new(StoryService::new(story_repo));
    let ai_model_service = Arc::new(AiModelService::new(ai_model_repo.clone(), codec.clone()));

    let resolver = ProviderResolver::new(ai_model_repo, codec, &config.ai);
    let analysis_service = Arc::new(AnalysisService::new(resolver, client, &config.ai));

    Ok(AppState {
        pool,
        user_service,
        story_service,
        ai_model_service,
        analysis_service,
    })
}
