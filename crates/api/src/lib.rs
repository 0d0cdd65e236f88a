//! HTTP API layer with Axum routes and middleware.
//!
//! This crate provides:
//! - REST API routes for the approval workflow
//! - Authentication middleware and extractors
//! - The SMTP notification dispatcher
//! - The periodic SLA enforcement job

pub mod error;
pub mod extractors;
pub mod jobs;
pub mod middleware;
pub mod notifications;
pub mod routes;

use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use quoteflow_core::approval::{ApprovalService, SlaEnforcer};
use quoteflow_shared::JwtService;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Approval state machine.
    pub approvals: ApprovalService,
    /// SLA sweep, for the manual trigger.
    pub sla: SlaEnforcer,
    /// JWT service for token validation.
    pub jwt_service: Arc<JwtService>,
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes_with_state(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
