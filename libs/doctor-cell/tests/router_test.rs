use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use doctor_cell::models::Doctor;
use doctor_cell::router::doctor_routes;
use doctor_cell::services::{InMemoryScheduleStore, ScheduleService};
use doctor_cell::state::DoctorCellState;
use shared_utils::test_utils::{TestConfig, TestUser};

struct TestApp {
    router: Router,
    secret: String,
    doctor: TestUser,
}

async fn test_app() -> TestApp {
    let config = TestConfig::default();
    let doctor = TestUser::doctor("doctor@example.com");

    let store = Arc::new(InMemoryScheduleStore::new());
    store.upsert_doctor(Doctor::new(doctor.id, "Dr. Mensah")).await;
    let schedules = Arc::new(ScheduleService::new(store.clone(), store));

    TestApp {
        router: doctor_routes(DoctorCellState::new(config.to_arc(), schedules)),
        secret: config.jwt_secret,
        doctor,
    }
}

fn json_request(method: &str, uri: &str, bearer: Option<String>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(bearer) = bearer {
        builder = builder.header("authorization", bearer);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let app = test_app().await;
    let uri = format!("/{}/schedules", app.doctor.id);

    let response = app
        .router
        .oneshot(json_request("POST", &uri, None, json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn doctor_creates_schedule_and_sees_calendar() {
    let app = test_app().await;
    let bearer = app.doctor.bearer(&app.secret);

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/{}/schedules", app.doctor.id),
            Some(bearer.clone()),
            json!({ "day_of_week": "Mon", "start_time": "09:00", "end_time": "10:00" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["start_time"], "09:00");

    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri(format!("/{}/calendar?from=2025-07-07&to=2025-07-08", app.doctor.id))
                .header("authorization", bearer)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let calendar = body_json(response).await;
    assert_eq!(calendar["days"][0]["has_schedule"], true);
    assert_eq!(calendar["days"][0]["windows"][0]["start"], "09:00");
    assert_eq!(calendar["days"][1]["has_schedule"], false);
}

#[tokio::test]
async fn other_patients_cannot_edit_a_schedule() {
    let app = test_app().await;
    let patient = TestUser::patient("patient@example.com");

    let response = app
        .router
        .oneshot(json_request(
            "POST",
            &format!("/{}/leaves", app.doctor.id),
            Some(patient.bearer(&app.secret)),
            json!({ "start_date": "2025-07-07", "end_date": "2025-07-08" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_approves_leave() {
    let app = test_app().await;
    let admin = TestUser::admin("admin@example.com");

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/{}/leaves", app.doctor.id),
            Some(app.doctor.bearer(&app.secret)),
            json!({ "start_date": "2025-07-07", "end_date": "2025-07-08", "reason": "Conference" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let leave = body_json(response).await;
    assert_eq!(leave["status"], "pending");
    let leave_id: Uuid = serde_json::from_value(leave["id"].clone()).unwrap();

    let response = app
        .router
        .oneshot(json_request(
            "PATCH",
            &format!("/{}/leaves/{}", app.doctor.id, leave_id),
            Some(admin.bearer(&app.secret)),
            json!({ "status": "approved" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "approved");
}

#[tokio::test]
async fn overlapping_schedule_is_a_conflict() {
    let app = test_app().await;
    let bearer = app.doctor.bearer(&app.secret);
    let uri = format!("/{}/date-schedules", app.doctor.id);

    let first = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            &uri,
            Some(bearer.clone()),
            json!({ "date": "2025-07-09", "start_time": "18:00", "end_time": "20:00" }),
        ))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = app
        .router
        .oneshot(json_request(
            "POST",
            &uri,
            Some(bearer),
            json!({ "date": "2025-07-09", "start_time": "19:00", "end_time": "21:00" }),
        ))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert!(body_json(second).await["error"].as_str().unwrap().contains("overlaps"));
}
