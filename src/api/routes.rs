//! REST API routes configuration

use crate::api::handlers::{self, ApiResponse, ApiState};
use crate::multisig::ErrorCategory;
use axum::{
    http::{StatusCode, Uri},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};

/// Unknown routes get the same tagged error shape as failed operations
async fn fallback_handler(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::<()>::Error {
            category: ErrorCategory::Validation,
            message: format!("No route for {}", uri.path()),
        }),
    )
}

/// Create the API router with all routes
pub fn create_router(state: ApiState) -> Router {
    // Configure CORS for browser access
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Multisig
        .route("/api/multisig", post(handlers::create_multisig))
        // Proposals
        .route(
            "/api/multisig/{address}/proposals/native",
            post(handlers::propose_native),
        )
        .route(
            "/api/multisig/{address}/proposals/token",
            post(handlers::propose_token),
        )
        .route(
            "/api/multisig/{address}/proposals/{index}",
            get(handlers::get_proposal_status),
        )
        .route(
            "/api/multisig/{address}/proposals/{index}/activate",
            post(handlers::activate_proposal),
        )
        .route(
            "/api/multisig/{address}/proposals/{index}/vote",
            post(handlers::vote_proposal),
        )
        .route(
            "/api/multisig/{address}/proposals/{index}/execute",
            post(handlers::execute_proposal),
        )
        .fallback(fallback_handler)
        // Add state and middleware
        .with_state(state)
        .layer(cors)
}
