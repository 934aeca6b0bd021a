use std::sync::Arc;

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use shared_config::AppConfig;

use crate::handlers;

pub fn scheduling_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        // Availability rule management
        .route(
            "/doctors/{doctor_id}/availability",
            get(handlers::get_availability_rules),
        )
        .route(
            "/doctors/{doctor_id}/availability",
            post(handlers::create_availability_rule),
        )
        .route(
            "/doctors/{doctor_id}/availability/{rule_id}",
            put(handlers::update_availability_rule),
        )
        .route(
            "/doctors/{doctor_id}/availability/{rule_id}",
            delete(handlers::delete_availability_rule),
        )
        // Slot grids
        .route("/doctors/{doctor_id}/slots", get(handlers::get_day_schedule))
        .route(
            "/doctors/{doctor_id}/slots/week",
            get(handlers::get_week_schedule),
        )
        .route(
            "/doctors/{doctor_id}/next-slot",
            get(handlers::get_next_available_slot),
        )
        // Booking
        .route("/appointments/validate", post(handlers::validate_booking))
        .route("/appointments", post(handlers::book_appointment))
        .with_state(state)
}
