// libs/appointment-cell/src/router.rs
use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::state::AppState;

pub fn appointment_routes(state: AppState) -> Router {
    // Availability is public
    let public_routes = Router::new()
        .route("/availability", get(handlers::get_availability))
        .route("/available-dates", get(handlers::get_available_dates))
        .route("/slot-check", post(handlers::check_slot));

    let protected_routes = Router::new()
        .route("/", post(handlers::book_appointment))
        .route(
            "/{appointment_id}",
            get(handlers::get_appointment).delete(handlers::cancel_appointment),
        )
        .route("/{appointment_id}/cancellation-request", post(handlers::request_cancellation))
        .route(
            "/{appointment_id}/cancellation-request/approve",
            post(handlers::approve_cancellation),
        )
        .route(
            "/{appointment_id}/cancellation-request/reject",
            post(handlers::reject_cancellation),
        )
        .route("/{appointment_id}/complete", post(handlers::complete_appointment))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
