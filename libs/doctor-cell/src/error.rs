use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use shared_database::SupabaseError;
use shared_models::error::AppError;

use crate::models::ScheduleKind;

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Doctor not found: {0}")]
    DoctorNotFound(Uuid),

    #[error("{kind} not found: {id}")]
    EntryNotFound { kind: ScheduleKind, id: Uuid },

    #[error("Schedule conflicts with an existing window: {0}")]
    Overlap(String),

    #[error("Availability override already exists for {0}")]
    DuplicateOverride(NaiveDate),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<SupabaseError> for ScheduleError {
    fn from(err: SupabaseError) -> Self {
        ScheduleError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for ScheduleError {
    fn from(err: serde_json::Error) -> Self {
        ScheduleError::Storage(format!("Failed to parse schedule row: {}", err))
    }
}

impl From<ScheduleError> for AppError {
    fn from(err: ScheduleError) -> Self {
        match err {
            ScheduleError::Validation(msg) => AppError::ValidationError(msg),
            ScheduleError::DoctorNotFound(_) | ScheduleError::EntryNotFound { .. } => {
                AppError::NotFound(err.to_string())
            }
            ScheduleError::Overlap(_) | ScheduleError::DuplicateOverride(_) => {
                AppError::Conflict(err.to_string())
            }
            ScheduleError::Storage(msg) => AppError::Database(msg),
        }
    }
}
