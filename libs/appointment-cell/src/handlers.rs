// libs/appointment-cell/src/handlers.rs
use axum::{
    body::Bytes,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    Appointment, ApproveCancellationRequest, BookAppointmentRequest, CancelAppointmentRequest,
    RejectCancellationRequest, RequestCancellationRequest, SlotCheckRequest,
};
use crate::state::AppState;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub hospital_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct AvailableDatesQuery {
    pub doctor_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub hospital_id: Option<Uuid>,
}

// ==============================================================================
// ACCESS HELPERS
// ==============================================================================

fn actor_id(user: &User) -> Result<Uuid, AppError> {
    user.uuid()
        .ok_or_else(|| AppError::Auth("Token subject is not a valid user id".to_string()))
}

fn is_party(user: &User, appointment: &Appointment) -> bool {
    user.is(appointment.patient_id) || user.is(appointment.doctor_id)
}

fn forbidden(action: &str) -> AppError {
    AppError::Forbidden(format!("Not authorized to {} this appointment", action))
}

/// Empty bodies deserialize to the default request.
fn optional_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid request body: {}", e)))
}

// ==============================================================================
// PUBLIC AVAILABILITY HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_availability(
    State(state): State<AppState>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let day = state
        .availability
        .get_availability(query.doctor_id, query.date, query.hospital_id)
        .await?;
    Ok(Json(json!(day)))
}

#[axum::debug_handler]
pub async fn get_available_dates(
    State(state): State<AppState>,
    Query(query): Query<AvailableDatesQuery>,
) -> Result<Json<Value>, AppError> {
    let dates = state
        .availability
        .get_available_dates(query.doctor_id, query.start_date, query.end_date, query.hospital_id)
        .await?;
    Ok(Json(json!(dates)))
}

#[axum::debug_handler]
pub async fn check_slot(
    State(state): State<AppState>,
    Json(request): Json<SlotCheckRequest>,
) -> Result<Json<Value>, AppError> {
    let available = state
        .availability
        .is_slot_available(request.doctor_id, request.date, request.time, request.hospital_id)
        .await?;

    Ok(Json(json!({
        "doctor_id": request.doctor_id,
        "date": request.date,
        "time": request.time,
        "hospital_id": request.hospital_id,
        "available": available
    })))
}

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    // Patients book for themselves; staff may book on a patient's behalf
    if !(user.is(request.patient_id) || user.is_doctor() || user.is_admin()) {
        return Err(AppError::Forbidden(
            "Not authorized to book an appointment for this patient".to_string(),
        ));
    }

    let appointment = state.booking.book(request).await?;
    Ok((StatusCode::CREATED, Json(json!(appointment))))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.workflow.get_appointment(appointment_id).await?;
    if !(is_party(&user, &appointment) || user.is_admin()) {
        return Err(forbidden("view"));
    }
    Ok(Json(json!(appointment)))
}

// ==============================================================================
// CANCELLATION WORKFLOW HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn request_cancellation(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<RequestCancellationRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_id(&user)?;
    let appointment = state.workflow.get_appointment(appointment_id).await?;
    if !(is_party(&user, &appointment) || user.is_admin()) {
        return Err(forbidden("cancel"));
    }

    let updated = state
        .workflow
        .request_cancellation(appointment_id, actor, &request.reason)
        .await?;

    Ok(Json(json!({
        "appointment": updated,
        "message": "Cancellation requested"
    })))
}

#[axum::debug_handler]
pub async fn approve_cancellation(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let actor = actor_id(&user)?;
    let request: ApproveCancellationRequest = optional_body(&body)?;
    let appointment = state.workflow.get_appointment(appointment_id).await?;
    if !(user.is(appointment.doctor_id) || user.is_admin()) {
        return Err(forbidden("approve cancellation of"));
    }

    let updated = state
        .workflow
        .approve_cancellation(appointment_id, actor, request.note)
        .await?;

    Ok(Json(json!({
        "appointment": updated,
        "message": "Cancellation approved"
    })))
}

#[axum::debug_handler]
pub async fn reject_cancellation(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let actor = actor_id(&user)?;
    let request: RejectCancellationRequest = optional_body(&body)?;
    let appointment = state.workflow.get_appointment(appointment_id).await?;
    if !(user.is(appointment.doctor_id) || user.is_admin()) {
        return Err(forbidden("reject cancellation of"));
    }

    let updated = state
        .workflow
        .reject_cancellation(appointment_id, actor, request.reason)
        .await?;

    Ok(Json(json!({
        "appointment": updated,
        "message": "Cancellation rejected"
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let actor = actor_id(&user)?;
    let request: CancelAppointmentRequest = optional_body(&body)?;
    let appointment = state.workflow.get_appointment(appointment_id).await?;
    if !(user.is(appointment.patient_id) || user.is_admin()) {
        return Err(forbidden("cancel"));
    }

    let updated = state
        .workflow
        .direct_cancel(appointment_id, actor, request.reason)
        .await?;

    Ok(Json(json!({
        "appointment": updated,
        "message": "Appointment cancelled"
    })))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.workflow.get_appointment(appointment_id).await?;
    if !(user.is(appointment.doctor_id) || user.is_admin()) {
        return Err(forbidden("complete"));
    }

    let updated = state.workflow.mark_completed(appointment_id).await?;
    Ok(Json(json!(updated)))
}
