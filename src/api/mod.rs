//! API layer - HTTP handlers and routing
//!
//! Everything is served under `/api/v1`:
//! - Health and writing prompt (public)
//! - Auth endpoints (register/login public, logout/me authenticated)
//! - Own profile, stories and AI configuration (authenticated)
//! - User management (superuser)

pub mod ai_model;
pub mod auth;
pub mod common;
pub mod middleware;
pub mod responses;
pub mod site;
pub mod stories;
pub mod users;


use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware, Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use middleware::{ApiError, AppState, AuthenticatedUser};

/// Build the main API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Superuser routes
    let admin_routes = Router::new()
        .nest("/users", users::admin_router())
        .route_layer(axum_middleware::from_fn(middleware::require_superuser))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Protected routes (need auth but not superuser)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/users", users::me_router())
        .nest("/stories", stories::router())
        .nest("/ai-model", ai_model::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Public routes
    Router::new()
        .merge(site::router())
        .nest("/auth", auth::public_router())
        .merge(protected_routes)
        .merge(admin_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    // CORS configuration - cookie authentication needs credentials
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);

    Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
