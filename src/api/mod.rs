//! API Routes for NeuroNest
//!
//! This module combines all API routes into a single router.
//! Routes are organized by domain and apply appropriate middleware.

mod extract;
mod notes;
mod status;
mod tags;

use std::path::Path;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::middleware::require_user;
use crate::AppState;

/// Build the API router.
///
/// Route structure:
/// - /notes/* - Note lifecycle (token-protected)
/// - /tags/* - Tag management (token-protected)
/// - /health - Health check (public)
pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health endpoint (public)
        .merge(status::routes())
        // Protected API routes
        .merge(protected_routes(state))
}

/// Routes that require an access token.
fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/notes", notes::routes())
        .nest("/tags", tags::routes())
        // Apply token authentication to all protected routes
        .route_layer(axum::middleware::from_fn_with_state(state, require_user))
}

/// Build the complete application: API routes, attachment file serving,
/// body limits, and request tracing.
///
/// The body limit comes from `AppState::max_request_body`. Over-limit
/// uploads surface as `FILE_TOO_LARGE` from the multipart reader.
pub fn app(state: AppState, attachments_root: impl AsRef<Path>) -> Router {
    let max_request_body = state.max_request_body;

    Router::new()
        .merge(routes(state.clone()))
        // Attachment files (public, read-only)
        .nest_service("/attachments", ServeDir::new(attachments_root.as_ref()))
        .layer(DefaultBodyLimit::max(max_request_body))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
