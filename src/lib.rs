pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod services;
pub mod state;

use std::sync::Arc;

use axum::routing::{delete, get, patch, post};
use axum::Router;

use crate::state::AppState;

/// Full HTTP surface. Shared by the binary and the integration tests so
/// both run the same routes.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/register", post(handlers::owner::register))
        .route("/api/businesses/:id", get(handlers::public::get_business))
        .route(
            "/api/businesses/:id/availability",
            get(handlers::public::get_availability),
        )
        .route(
            "/api/businesses/:id/bookings",
            post(handlers::public::create_booking),
        )
        .route(
            "/api/bookings/:reference",
            get(handlers::public::get_booking_by_reference),
        )
        .route("/api/my/business", post(handlers::owner::create_business))
        .route("/api/my/business", get(handlers::owner::get_my_business))
        .route("/api/my/business", patch(handlers::owner::update_business))
        .route("/api/my/services", post(handlers::owner::create_service))
        .route("/api/my/services", get(handlers::owner::list_services))
        .route(
            "/api/my/services/:id",
            patch(handlers::owner::update_service),
        )
        .route(
            "/api/my/services/:id",
            delete(handlers::owner::delete_service),
        )
        .route("/api/my/bookings", get(handlers::owner::list_bookings))
        .route(
            "/api/my/bookings/:id/status",
            patch(handlers::owner::update_booking_status),
        )
        .route("/api/my/stats", get(handlers::owner::get_stats))
        .route(
            "/api/my/assistant/message",
            post(handlers::assistant::send_message),
        )
        .route(
            "/api/my/assistant/proposals",
            get(handlers::assistant::list_proposals),
        )
        .route(
            "/api/my/assistant/proposals/:id/confirm",
            post(handlers::assistant::confirm_proposal),
        )
        .route(
            "/api/my/assistant/proposals/:id/reject",
            post(handlers::assistant::reject_proposal),
        )
        .with_state(state)
}
