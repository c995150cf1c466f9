// libs/appointment-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::error::AppError;
use shared_models::time::TimeOfDay;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    /// Hospital of the slot that was booked; `None` for site-agnostic windows.
    #[serde(default)]
    pub hospital_id: Option<Uuid>,
    pub date: NaiveDate,
    pub time: TimeOfDay,
    pub duration_minutes: u32,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub cancellation_reason: Option<String>,
    #[serde(default)]
    pub cancellation_requested_by: Option<Uuid>,
    #[serde(default)]
    pub cancellation_requested_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resolved_by: Option<Uuid>,
    #[serde(default)]
    pub resolution_note: Option<String>,
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn new(slot: SlotKey, patient_id: Uuid, duration_minutes: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            doctor_id: slot.doctor_id,
            patient_id,
            hospital_id: slot.hospital_id,
            date: slot.date,
            time: slot.time,
            duration_minutes,
            status: AppointmentStatus::Scheduled,
            cancellation_reason: None,
            cancellation_requested_by: None,
            cancellation_requested_at: None,
            resolved_by: None,
            resolution_note: None,
            cancelled_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn slot_key(&self) -> SlotKey {
        SlotKey {
            doctor_id: self.doctor_id,
            date: self.date,
            time: self.time,
            hospital_id: self.hospital_id,
        }
    }

    /// Whether the appointment still holds its slot.
    pub fn is_active(&self) -> bool {
        self.status.holds_slot()
    }

    pub fn end_time(&self) -> Option<TimeOfDay> {
        self.time.checked_add_minutes(self.duration_minutes)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    CancellationRequested,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    /// Every status except `Cancelled` keeps the slot occupied.
    pub fn holds_slot(self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::Completed)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::CancellationRequested => write!(f, "cancellation_requested"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Completed => write!(f, "completed"),
        }
    }
}

/// The unit of mutual exclusion: at most one active appointment per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub time: TimeOfDay,
    pub hospital_id: Option<Uuid>,
}

/// A status change plus the audit fields it writes, applied only if the
/// stored status still equals the expected one.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatusChange {
    pub status: AppointmentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_requested_by: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_requested_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl StatusChange {
    pub fn to(status: AppointmentStatus) -> Self {
        Self {
            status,
            cancellation_reason: None,
            cancellation_requested_by: None,
            cancellation_requested_at: None,
            resolved_by: None,
            resolution_note: None,
            cancelled_at: None,
            completed_at: None,
            updated_at: Utc::now(),
        }
    }

    pub fn apply(&self, appointment: &mut Appointment) {
        appointment.status = self.status;
        if self.cancellation_reason.is_some() {
            appointment.cancellation_reason = self.cancellation_reason.clone();
        }
        if self.cancellation_requested_by.is_some() {
            appointment.cancellation_requested_by = self.cancellation_requested_by;
        }
        if self.cancellation_requested_at.is_some() {
            appointment.cancellation_requested_at = self.cancellation_requested_at;
        }
        if self.resolved_by.is_some() {
            appointment.resolved_by = self.resolved_by;
        }
        if self.resolution_note.is_some() {
            appointment.resolution_note = self.resolution_note.clone();
        }
        if self.cancelled_at.is_some() {
            appointment.cancelled_at = self.cancelled_at;
        }
        if self.completed_at.is_some() {
            appointment.completed_at = self.completed_at;
        }
        appointment.updated_at = self.updated_at;
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub time: TimeOfDay,
    pub hospital_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotCheckRequest {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub time: TimeOfDay,
    pub hospital_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestCancellationRequest {
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApproveCancellationRequest {
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RejectCancellationRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: Option<String>,
}

// ==============================================================================
// AVAILABILITY MODELS
// ==============================================================================

pub const ALREADY_BOOKED: &str = "Already booked";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlotView {
    pub time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub hospital_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hospital_name: Option<String>,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HospitalSlots {
    pub hospital_id: Option<Uuid>,
    pub hospital_name: Option<String>,
    pub available_count: usize,
    pub slots: Vec<SlotView>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DayAvailability {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub hospital_id: Option<Uuid>,
    pub slots: Vec<SlotView>,
    pub by_hospital: Vec<HospitalSlots>,
    pub is_fully_booked: bool,
    pub has_schedule: bool,
    pub is_on_leave: bool,
    pub reason: Option<String>,
}

impl DayAvailability {
    pub fn available_slots(&self) -> impl Iterator<Item = &SlotView> {
        self.slots.iter().filter(|s| s.available)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AvailableDates {
    pub doctor_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub available_dates: Vec<NaiveDate>,
    pub fully_booked_dates: Vec<NaiveDate>,
    pub unavailable_dates: Vec<NaiveDate>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppointmentError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Doctor not found: {0}")]
    DoctorNotFound(Uuid),

    #[error("Appointment not found: {0}")]
    NotFound(Uuid),

    #[error("Doctor has no schedule on this date{}", fmt_reason(.reason))]
    NoSchedule { reason: Option<String> },

    #[error("Doctor is on leave{}", fmt_reason(.reason))]
    OnLeave { reason: Option<String> },

    #[error("{time} on {date} is not an offered slot")]
    SlotNotOffered { date: NaiveDate, time: TimeOfDay },

    #[error("{time} is offered at {} hospitals; choose one", .hospitals.len())]
    AmbiguousHospital { time: TimeOfDay, hospitals: Vec<Option<Uuid>> },

    #[error("Slot is already booked")]
    SlotConflict,

    #[error("Cannot {action} an appointment that is {from}")]
    InvalidStateTransition { from: AppointmentStatus, action: String },

    #[error("Unauthorized access to appointment: {0}")]
    Unauthorized(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

fn fmt_reason(reason: &Option<String>) -> String {
    reason.as_ref().map(|r| format!(": {}", r)).unwrap_or_default()
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        let message = err.to_string();
        match err {
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::DoctorNotFound(_) | AppointmentError::NotFound(_) => {
                AppError::NotFound(message)
            }
            AppointmentError::NoSchedule { .. }
            | AppointmentError::OnLeave { .. }
            | AppointmentError::SlotNotOffered { .. }
            | AppointmentError::AmbiguousHospital { .. } => AppError::BadRequest(message),
            AppointmentError::SlotConflict | AppointmentError::InvalidStateTransition { .. } => {
                AppError::Conflict(message)
            }
            AppointmentError::Unauthorized(_) => AppError::Forbidden(message),
            AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

impl From<doctor_cell::ScheduleError> for AppointmentError {
    fn from(err: doctor_cell::ScheduleError) -> Self {
        use doctor_cell::ScheduleError;
        match err {
            ScheduleError::DoctorNotFound(id) => AppointmentError::DoctorNotFound(id),
            ScheduleError::Validation(msg) => AppointmentError::ValidationError(msg),
            other => AppointmentError::DatabaseError(other.to_string()),
        }
    }
}
