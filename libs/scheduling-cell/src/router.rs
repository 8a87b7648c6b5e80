use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put, delete},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn scheduling_routes(state: Arc<AppConfig>) -> Router {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/{doctor_id}/available-slots", get(handlers::get_available_slots_public));

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        .route("/{doctor_id}/overview", get(handlers::get_schedule_overview))

        // Slot definition management
        .route("/{doctor_id}/slots", get(handlers::list_slot_definitions))
        .route("/{doctor_id}/slots", post(handlers::create_slot_definition))
        .route("/{doctor_id}/slots/validate", post(handlers::validate_slot))
        .route("/{doctor_id}/slots/{slot_id}", put(handlers::update_slot_definition))
        .route("/{doctor_id}/slots/{slot_id}", delete(handlers::delete_slot_definition))

        // Blocked dates
        .route("/{doctor_id}/blocked-dates", get(handlers::list_blocked_dates))
        .route("/{doctor_id}/blocked-dates", post(handlers::create_blocked_date))
        .route("/{doctor_id}/blocked-dates/{blocked_date_id}", delete(handlers::remove_blocked_date))

        // Locations
        .route("/{doctor_id}/locations", get(handlers::list_locations))
        .route("/{doctor_id}/locations", post(handlers::create_location))
        .route("/{doctor_id}/locations/{location_id}", put(handlers::update_location))

        // Atomic batch configuration save
        .route("/{doctor_id}/schedule-config", put(handlers::apply_schedule_config))

        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
