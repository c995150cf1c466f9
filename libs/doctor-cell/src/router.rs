use axum::{
    middleware,
    routing::{delete, get, patch, post},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::state::DoctorCellState;

pub fn doctor_routes(state: DoctorCellState) -> Router {
    // Every schedule route is authenticated; handlers check doctor/admin access
    let protected_routes = Router::new()
        .route("/{doctor_id}/calendar", get(handlers::get_calendar))
        .route("/{doctor_id}/schedules", post(handlers::create_recurring_schedule))
        .route("/{doctor_id}/schedules/{schedule_id}", delete(handlers::delete_recurring_schedule))
        .route("/{doctor_id}/date-schedules", post(handlers::create_date_schedule))
        .route("/{doctor_id}/date-schedules/{schedule_id}", delete(handlers::delete_date_schedule))
        .route("/{doctor_id}/availability-overrides", post(handlers::create_availability_override))
        .route(
            "/{doctor_id}/availability-overrides/{override_id}",
            delete(handlers::delete_availability_override),
        )
        .route("/{doctor_id}/leaves", post(handlers::create_leave))
        .route(
            "/{doctor_id}/leaves/{leave_id}",
            patch(handlers::update_leave_status).delete(handlers::delete_leave),
        )
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
