//! API route definitions

use std::sync::Arc;

use axum::{
    routing::get,
    Router,
};

use super::handlers;
use super::AppState;

/// Create API routes
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Health check
        .route("/api/v1/health", get(handlers::health_check))
        // Languages
        .route("/api/v1/languages", get(handlers::list_languages))
        // Project management
        .route(
            "/api/v1/projects",
            get(handlers::list_projects).post(handlers::create_project),
        )
        .route(
            "/api/v1/projects/:id",
            get(handlers::get_project).delete(handlers::delete_project),
        )
        // Views
        .route("/api/v1/projects/:id/views/:view", get(handlers::get_view))
}
