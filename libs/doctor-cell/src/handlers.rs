use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    CreateAvailabilityOverrideRequest, CreateDateScheduleRequest, CreateLeaveRequest,
    CreateRecurringScheduleRequest, ScheduleKind, UpdateLeaveStatusRequest,
};
use crate::services::resolver::ScheduleResolver;
use crate::services::schedule::ScheduleService;
use crate::state::DoctorCellState;

#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub hospital_id: Option<Uuid>,
}

/// Schedule administration is limited to the doctor and admins.
fn ensure_schedule_admin(user: &User, doctor_id: Uuid) -> Result<(), AppError> {
    if user.is(doctor_id) || user.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Only the doctor or an admin can manage this schedule".to_string(),
        ))
    }
}

// ==============================================================================
// CALENDAR
// ==============================================================================

#[axum::debug_handler]
pub async fn get_calendar(
    State(state): State<DoctorCellState>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<CalendarQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    ensure_schedule_admin(&user, doctor_id)?;

    let span_days = (query.to - query.from).num_days() + 1;
    if span_days > state.config.max_availability_range_days {
        return Err(AppError::ValidationError(format!(
            "Calendar range is limited to {} days",
            state.config.max_availability_range_days
        )));
    }

    let doctor = state.schedules.get_doctor(doctor_id).await?;
    ScheduleService::check_hospital(&doctor, query.hospital_id)?;
    let calendar = state.schedules.calendar(doctor_id, query.from, query.to).await?;

    let days: Vec<Value> = query
        .from
        .iter_days()
        .take_while(|date| *date <= query.to)
        .map(|date| {
            let resolution =
                ScheduleResolver::resolve(&doctor, &calendar, date, query.hospital_id);
            json!({
                "date": date,
                "has_schedule": resolution.has_schedule(),
                "is_on_leave": resolution.is_on_leave(),
                "reason": resolution.reason(),
                "windows": resolution.windows(),
            })
        })
        .collect();

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "from": query.from,
        "to": query.to,
        "recurring_schedules": calendar.recurring,
        "date_schedules": calendar.date_schedules,
        "availability_overrides": calendar.overrides,
        "leaves": calendar.leaves,
        "days": days,
    })))
}

// ==============================================================================
// SCHEDULES
// ==============================================================================

#[axum::debug_handler]
pub async fn create_recurring_schedule(
    State(state): State<DoctorCellState>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateRecurringScheduleRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    ensure_schedule_admin(&user, doctor_id)?;
    let schedule = state.schedules.create_recurring_schedule(doctor_id, request).await?;
    Ok((StatusCode::CREATED, Json(json!(schedule))))
}

#[axum::debug_handler]
pub async fn delete_recurring_schedule(
    State(state): State<DoctorCellState>,
    Path((doctor_id, schedule_id)): Path<(Uuid, Uuid)>,
    Extension(user): Extension<User>,
) -> Result<StatusCode, AppError> {
    ensure_schedule_admin(&user, doctor_id)?;
    state.schedules.delete_entry(doctor_id, ScheduleKind::Recurring, schedule_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn create_date_schedule(
    State(state): State<DoctorCellState>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateDateScheduleRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    ensure_schedule_admin(&user, doctor_id)?;
    let schedule = state.schedules.create_date_schedule(doctor_id, request).await?;
    Ok((StatusCode::CREATED, Json(json!(schedule))))
}

#[axum::debug_handler]
pub async fn delete_date_schedule(
    State(state): State<DoctorCellState>,
    Path((doctor_id, schedule_id)): Path<(Uuid, Uuid)>,
    Extension(user): Extension<User>,
) -> Result<StatusCode, AppError> {
    ensure_schedule_admin(&user, doctor_id)?;
    state.schedules.delete_entry(doctor_id, ScheduleKind::Dated, schedule_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ==============================================================================
// OVERRIDES AND LEAVE
// ==============================================================================

#[axum::debug_handler]
pub async fn create_availability_override(
    State(state): State<DoctorCellState>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAvailabilityOverrideRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    ensure_schedule_admin(&user, doctor_id)?;
    let entry = state.schedules.create_availability_override(doctor_id, request).await?;
    Ok((StatusCode::CREATED, Json(json!(entry))))
}

#[axum::debug_handler]
pub async fn delete_availability_override(
    State(state): State<DoctorCellState>,
    Path((doctor_id, override_id)): Path<(Uuid, Uuid)>,
    Extension(user): Extension<User>,
) -> Result<StatusCode, AppError> {
    ensure_schedule_admin(&user, doctor_id)?;
    state.schedules.delete_entry(doctor_id, ScheduleKind::Override, override_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn create_leave(
    State(state): State<DoctorCellState>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateLeaveRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    ensure_schedule_admin(&user, doctor_id)?;
    let leave = state.schedules.create_leave(doctor_id, request).await?;
    Ok((StatusCode::CREATED, Json(json!(leave))))
}

#[axum::debug_handler]
pub async fn update_leave_status(
    State(state): State<DoctorCellState>,
    Path((doctor_id, leave_id)): Path<(Uuid, Uuid)>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateLeaveStatusRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_schedule_admin(&user, doctor_id)?;
    let leave = state.schedules.update_leave_status(doctor_id, leave_id, request.status).await?;
    Ok(Json(json!(leave)))
}

#[axum::debug_handler]
pub async fn delete_leave(
    State(state): State<DoctorCellState>,
    Path((doctor_id, leave_id)): Path<(Uuid, Uuid)>,
    Extension(user): Extension<User>,
) -> Result<StatusCode, AppError> {
    ensure_schedule_admin(&user, doctor_id)?;
    state.schedules.delete_entry(doctor_id, ScheduleKind::Leave, leave_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
