//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod batch;
pub mod error;
pub mod health;
pub mod item;
pub mod template;

use axum::{
    Router,
    routing::{get, post},
};
use sqlx::PgPool;
use tower_http::trace::TraceLayer;

/// Create the main API router with all endpoints
pub fn create_router(pool: PgPool) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Template endpoints
        .route("/template/create", post(template::create_template))
        .route("/template/list", get(template::list_templates))
        .route("/template/{id}", get(template::get_template))
        // Batch endpoints
        .route("/batch/submit", post(batch::submit_batch))
        .route("/batch/{id}", get(batch::get_batch_status))
        .route("/batch/{id}/retry", post(batch::retry_batch))
        .route("/batch/{id}/compensation", get(batch::get_compensation))
        // Work item endpoints
        .route("/item/list", get(item::list_items))
        .route("/item/{id}", get(item::get_item))
        .route("/item/{id}/transition", post(item::transition_item))
        // Add state and middleware
        .with_state(pool)
        .layer(TraceLayer::new_for_http())
}
