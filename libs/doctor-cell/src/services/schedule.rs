use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::time::TimeOfDay;

use crate::error::ScheduleError;
use crate::models::{
    AvailabilityOverride, CreateAvailabilityOverrideRequest, CreateDateScheduleRequest,
    CreateLeaveRequest, CreateRecurringScheduleRequest, DateSchedule, Doctor, DoctorCalendar,
    Leave, LeaveStatus, RecurringSchedule, Resolution, ScheduleKind,
};
use crate::services::resolver::ScheduleResolver;
use crate::services::store::{DoctorDirectory, ScheduleStore};

fn overlaps(a: (TimeOfDay, TimeOfDay), b: (TimeOfDay, TimeOfDay)) -> bool {
    a.0 < b.1 && b.0 < a.1
}

/// Two windows compete for the same slots unless a multi-site doctor keeps
/// them at different hospitals. A site-agnostic window shares every site.
fn shares_site(doctor: &Doctor, a: Option<Uuid>, b: Option<Uuid>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) if doctor.is_multi_site() => a == b,
        _ => true,
    }
}

fn validate_window(start: TimeOfDay, end: TimeOfDay) -> Result<(), ScheduleError> {
    if start >= end {
        return Err(ScheduleError::Validation(format!(
            "Start time {} must be before end time {}",
            start, end
        )));
    }
    Ok(())
}

/// Schedule administration and calendar reads for a single doctor.
pub struct ScheduleService {
    store: Arc<dyn ScheduleStore>,
    directory: Arc<dyn DoctorDirectory>,
}

impl ScheduleService {
    pub fn new(store: Arc<dyn ScheduleStore>, directory: Arc<dyn DoctorDirectory>) -> Self {
        Self { store, directory }
    }

    pub async fn get_doctor(&self, doctor_id: Uuid) -> Result<Doctor, ScheduleError> {
        if doctor_id.is_nil() {
            return Err(ScheduleError::Validation("Doctor id must not be nil".to_string()));
        }
        self.directory
            .get_doctor(doctor_id)
            .await?
            .ok_or(ScheduleError::DoctorNotFound(doctor_id))
    }

    /// Loads the calendar snapshot covering `from..=to`.
    pub async fn calendar(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<DoctorCalendar, ScheduleError> {
        if to < from {
            return Err(ScheduleError::Validation(format!(
                "Range end {} precedes start {}",
                to, from
            )));
        }
        self.store.load_calendar(doctor_id, from, to).await
    }

    pub async fn resolve_day(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        hospital_id: Option<Uuid>,
    ) -> Result<Resolution, ScheduleError> {
        let doctor = self.get_doctor(doctor_id).await?;
        Self::check_hospital(&doctor, hospital_id)?;
        let calendar = self.calendar(doctor_id, date, date).await?;
        Ok(ScheduleResolver::resolve(&doctor, &calendar, date, hospital_id))
    }

    /// Rejects a hospital the doctor does not work at.
    pub fn check_hospital(doctor: &Doctor, hospital_id: Option<Uuid>) -> Result<(), ScheduleError> {
        match hospital_id {
            Some(h) if !doctor.is_affiliated(h) => {
                Err(ScheduleError::Validation(format!(
                    "Doctor {} is not affiliated with hospital {}",
                    doctor.id, h
                )))
            }
            _ => Ok(()),
        }
    }

    pub async fn create_recurring_schedule(
        &self,
        doctor_id: Uuid,
        request: CreateRecurringScheduleRequest,
    ) -> Result<RecurringSchedule, ScheduleError> {
        validate_window(request.start_time, request.end_time)?;
        let doctor = self.get_doctor(doctor_id).await?;
        Self::check_hospital(&doctor, request.hospital_id)?;

        // recurring entries are not date-bound, any single day loads them all
        let today = chrono::Utc::now().date_naive();
        let calendar = self.store.load_calendar(doctor_id, today, today).await?;
        if let Some(existing) = calendar.recurring_on(request.day_of_week).find(|s| {
            shares_site(&doctor, s.hospital_id, request.hospital_id)
                && overlaps((s.start_time, s.end_time), (request.start_time, request.end_time))
        }) {
            warn!("Recurring window rejected for doctor {}: overlaps {}", doctor_id, existing.id);
            return Err(ScheduleError::Overlap(format!(
                "{} {}-{} overlaps existing window {}-{}",
                request.day_of_week, request.start_time, request.end_time,
                existing.start_time, existing.end_time
            )));
        }

        let created = self
            .store
            .insert_recurring(RecurringSchedule {
                id: Uuid::new_v4(),
                doctor_id,
                day_of_week: request.day_of_week,
                start_time: request.start_time,
                end_time: request.end_time,
                hospital_id: request.hospital_id,
            })
            .await?;

        info!(
            "Recurring schedule {} added for doctor {} on {}",
            created.id, doctor_id, created.day_of_week
        );
        Ok(created)
    }

    pub async fn create_date_schedule(
        &self,
        doctor_id: Uuid,
        request: CreateDateScheduleRequest,
    ) -> Result<DateSchedule, ScheduleError> {
        validate_window(request.start_time, request.end_time)?;
        let doctor = self.get_doctor(doctor_id).await?;
        Self::check_hospital(&doctor, request.hospital_id)?;

        let calendar = self.store.load_calendar(doctor_id, request.date, request.date).await?;
        if let Some(existing) = calendar.dated_on(request.date).find(|s| {
            shares_site(&doctor, s.hospital_id, request.hospital_id)
                && overlaps((s.start_time, s.end_time), (request.start_time, request.end_time))
        }) {
            warn!("Date schedule rejected for doctor {}: overlaps {}", doctor_id, existing.id);
            return Err(ScheduleError::Overlap(format!(
                "{} {}-{} overlaps existing window {}-{}",
                request.date, request.start_time, request.end_time,
                existing.start_time, existing.end_time
            )));
        }

        let created = self
            .store
            .insert_date_schedule(DateSchedule {
                id: Uuid::new_v4(),
                doctor_id,
                date: request.date,
                start_time: request.start_time,
                end_time: request.end_time,
                hospital_id: request.hospital_id,
            })
            .await?;

        info!("Date schedule {} added for doctor {} on {}", created.id, doctor_id, created.date);
        Ok(created)
    }

    /// An unavailable override without times closes the whole day.
    pub async fn create_availability_override(
        &self,
        doctor_id: Uuid,
        request: CreateAvailabilityOverrideRequest,
    ) -> Result<AvailabilityOverride, ScheduleError> {
        let requested = (request.start_time, request.end_time, request.is_available);
        let (start_time, end_time) = match requested {
            (Some(start), Some(end), _) => (start, end),
            (None, None, false) => (TimeOfDay::MIDNIGHT, TimeOfDay::END_OF_DAY),
            _ if request.is_available => {
                return Err(ScheduleError::Validation(
                    "An available override needs both start_time and end_time".to_string(),
                ))
            }
            _ => {
                return Err(ScheduleError::Validation(
                    "Provide both start_time and end_time, or neither".to_string(),
                ))
            }
        };
        validate_window(start_time, end_time)?;

        let doctor = self.get_doctor(doctor_id).await?;
        Self::check_hospital(&doctor, request.hospital_id)?;

        let reason = request
            .reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        let created = self
            .store
            .insert_override(AvailabilityOverride {
                id: Uuid::new_v4(),
                doctor_id,
                date: request.date,
                start_time,
                end_time,
                is_available: request.is_available,
                reason,
                hospital_id: request.hospital_id,
            })
            .await?;

        info!(
            "Override {} on {} for doctor {} (available: {})",
            created.id, created.date, doctor_id, created.is_available
        );
        Ok(created)
    }

    pub async fn create_leave(
        &self,
        doctor_id: Uuid,
        request: CreateLeaveRequest,
    ) -> Result<Leave, ScheduleError> {
        if request.end_date < request.start_date {
            return Err(ScheduleError::Validation(format!(
                "Leave end {} precedes start {}",
                request.end_date, request.start_date
            )));
        }
        self.get_doctor(doctor_id).await?;

        let created = self
            .store
            .insert_leave(Leave {
                id: Uuid::new_v4(),
                doctor_id,
                start_date: request.start_date,
                end_date: request.end_date,
                reason: request.reason,
                status: request.status.unwrap_or(LeaveStatus::Pending),
            })
            .await?;

        info!(
            "Leave {} ({}) recorded for doctor {}: {} to {}",
            created.id, created.status, doctor_id, created.start_date, created.end_date
        );
        Ok(created)
    }

    pub async fn update_leave_status(
        &self,
        doctor_id: Uuid,
        leave_id: Uuid,
        status: LeaveStatus,
    ) -> Result<Leave, ScheduleError> {
        let leave = self.store.update_leave_status(doctor_id, leave_id, status).await?;
        info!("Leave {} for doctor {} is now {}", leave_id, doctor_id, leave.status);
        Ok(leave)
    }

    pub async fn delete_entry(
        &self,
        doctor_id: Uuid,
        kind: ScheduleKind,
        id: Uuid,
    ) -> Result<(), ScheduleError> {
        debug!("Deleting {} {} for doctor {}", kind, id, doctor_id);
        self.store.delete(doctor_id, kind, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> TimeOfDay {
        s.parse().unwrap()
    }

    #[test]
    fn touching_windows_do_not_overlap() {
        assert!(!overlaps((t("09:00"), t("12:00")), (t("12:00"), t("14:00"))));
        assert!(overlaps((t("09:00"), t("12:00")), (t("11:30"), t("14:00"))));
        assert!(overlaps((t("09:00"), t("12:00")), (t("10:00"), t("11:00"))));
    }

    #[test]
    fn empty_window_is_rejected() {
        assert!(validate_window(t("10:00"), t("10:00")).is_err());
        assert!(validate_window(t("23:00"), t("24:00")).is_ok());
    }
}
