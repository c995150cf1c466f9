use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use appointment_cell::router::appointment_routes;
use appointment_cell::AppState;
use doctor_cell::router::doctor_routes;
use doctor_cell::DoctorCellState;

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn create_router(doctor_state: DoctorCellState, appointment_state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .route("/health", get(health))
        .nest("/doctors", doctor_routes(doctor_state))
        .nest("/appointments", appointment_routes(appointment_state))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;
    use uuid::Uuid;

    use appointment_cell::services::{InMemoryBookingStore, TracingNotifier};
    use doctor_cell::models::Doctor;
    use doctor_cell::services::{InMemoryScheduleStore, ScheduleService};
    use shared_utils::test_utils::TestConfig;

    use super::*;

    async fn app(doctor_id: Uuid) -> Router {
        let config = TestConfig::default().to_arc();
        let store = Arc::new(InMemoryScheduleStore::new());
        store.upsert_doctor(Doctor::new(doctor_id, "Dr. Mensah")).await;
        let schedules = Arc::new(ScheduleService::new(store.clone(), store));

        create_router(
            DoctorCellState::new(config.clone(), schedules.clone()),
            AppState::new(
                config,
                schedules,
                Arc::new(InMemoryBookingStore::new()),
                Arc::new(TracingNotifier),
            ),
        )
    }

    #[tokio::test]
    async fn health_is_ok() {
        let response = app(Uuid::new_v4())
            .await
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn cells_are_nested() {
        let doctor_id = Uuid::new_v4();
        let router = app(doctor_id).await;

        let uri = format!("/appointments/availability?doctor_id={}&date=2025-07-07", doctor_id);
        let response = router
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // schedule administration needs a token
        let uri = format!("/doctors/{}/calendar?from=2025-07-07&to=2025-07-13", doctor_id);
        let response = router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
