use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use shared_models::time::TimeOfDay;

pub const DEFAULT_APPOINTMENT_DURATION_MINUTES: u32 = 30;

fn default_duration() -> u32 {
    DEFAULT_APPOINTMENT_DURATION_MINUTES
}

// ==============================================================================
// DOCTOR DIRECTORY MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HospitalAffiliation {
    pub hospital_id: Uuid,
    pub name: String,
}

/// Read-only view of a doctor, as supplied by the doctor directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Doctor {
    pub id: Uuid,
    pub full_name: String,
    #[serde(default)]
    pub department_id: Option<Uuid>,
    #[serde(default = "default_duration")]
    pub appointment_duration_minutes: u32,
    #[serde(default)]
    pub break_time_minutes: u32,
    #[serde(default)]
    pub hospitals: Vec<HospitalAffiliation>,
}

impl Doctor {
    pub fn new(id: Uuid, full_name: impl Into<String>) -> Self {
        Self {
            id,
            full_name: full_name.into(),
            department_id: None,
            appointment_duration_minutes: DEFAULT_APPOINTMENT_DURATION_MINUTES,
            break_time_minutes: 0,
            hospitals: Vec::new(),
        }
    }

    pub fn with_timing(mut self, duration_minutes: u32, break_minutes: u32) -> Self {
        self.appointment_duration_minutes = duration_minutes;
        self.break_time_minutes = break_minutes;
        self
    }

    pub fn with_hospital(mut self, hospital_id: Uuid, name: impl Into<String>) -> Self {
        self.hospitals.push(HospitalAffiliation { hospital_id, name: name.into() });
        self
    }

    pub fn is_multi_site(&self) -> bool {
        self.hospitals.len() > 1
    }

    /// An empty affiliation list means the directory does not restrict sites.
    pub fn is_affiliated(&self, hospital_id: Uuid) -> bool {
        self.hospitals.is_empty() || self.hospital_name(hospital_id).is_some()
    }

    /// The hospital a slot is held under. A single-site doctor keeps one
    /// slot per time whichever window offered it.
    pub fn booking_site(&self, window_hospital: Option<Uuid>) -> Option<Uuid> {
        if self.is_multi_site() {
            window_hospital
        } else {
            self.hospitals.first().map(|h| h.hospital_id)
        }
    }

    pub fn hospital_name(&self, hospital_id: Uuid) -> Option<&str> {
        self.hospitals
            .iter()
            .find(|h| h.hospital_id == hospital_id)
            .map(|h| h.name.as_str())
    }
}

// ==============================================================================
// SCHEDULE STORE RECORDS
// ==============================================================================

/// A standing weekly work window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecurringSchedule {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub day_of_week: Weekday,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    #[serde(default)]
    pub hospital_id: Option<Uuid>,
}

/// A one-off session on a single calendar date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DateSchedule {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    #[serde(default)]
    pub hospital_id: Option<Uuid>,
}

/// Date-level availability that takes precedence over schedules for its
/// date and hospital scope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AvailabilityOverride {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub is_available: bool,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub hospital_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for LeaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeaveStatus::Pending => write!(f, "pending"),
            LeaveStatus::Approved => write!(f, "approved"),
            LeaveStatus::Rejected => write!(f, "rejected"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Leave {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub reason: Option<String>,
    pub status: LeaveStatus,
}

impl Leave {
    /// Only approved leave blocks a date; the range is inclusive.
    pub fn blocks(&self, date: NaiveDate) -> bool {
        self.status == LeaveStatus::Approved && self.start_date <= date && date <= self.end_date
    }

    pub fn overlaps_range(&self, from: NaiveDate, to: NaiveDate) -> bool {
        self.start_date <= to && from <= self.end_date
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    Recurring,
    Dated,
    Override,
    Leave,
}

impl fmt::Display for ScheduleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleKind::Recurring => write!(f, "recurring schedule"),
            ScheduleKind::Dated => write!(f, "date schedule"),
            ScheduleKind::Override => write!(f, "availability override"),
            ScheduleKind::Leave => write!(f, "leave"),
        }
    }
}

/// Everything the resolver needs for one doctor over a date range.
///
/// Recurring schedules are always complete; date-bound records only cover
/// the range the calendar was loaded for.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DoctorCalendar {
    pub doctor_id: Uuid,
    pub recurring: Vec<RecurringSchedule>,
    pub date_schedules: Vec<DateSchedule>,
    pub overrides: Vec<AvailabilityOverride>,
    pub leaves: Vec<Leave>,
}

impl DoctorCalendar {
    pub fn new(doctor_id: Uuid) -> Self {
        Self { doctor_id, ..Self::default() }
    }

    pub fn recurring_on(&self, weekday: Weekday) -> impl Iterator<Item = &RecurringSchedule> {
        self.recurring.iter().filter(move |s| s.day_of_week == weekday)
    }

    pub fn dated_on(&self, date: NaiveDate) -> impl Iterator<Item = &DateSchedule> {
        self.date_schedules.iter().filter(move |s| s.date == date)
    }

    pub fn overrides_on(&self, date: NaiveDate) -> impl Iterator<Item = &AvailabilityOverride> {
        self.overrides.iter().filter(move |o| o.date == date)
    }

    pub fn leave_on(&self, date: NaiveDate) -> Option<&Leave> {
        self.leaves.iter().find(|l| l.blocks(date))
    }
}

// ==============================================================================
// RESOLUTION MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WindowSource {
    Recurring,
    Dated,
    Override,
}

/// A concrete open range on a specific date, tagged with its hospital.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EffectiveWindow {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
    pub hospital_id: Option<Uuid>,
    pub source: WindowSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Open(Vec<EffectiveWindow>),
    OnLeave { reason: Option<String> },
    NoSchedule { reason: Option<String> },
}

impl Resolution {
    pub fn windows(&self) -> &[EffectiveWindow] {
        match self {
            Resolution::Open(windows) => windows,
            _ => &[],
        }
    }

    pub fn is_on_leave(&self) -> bool {
        matches!(self, Resolution::OnLeave { .. })
    }

    pub fn has_schedule(&self) -> bool {
        matches!(self, Resolution::Open(_))
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Resolution::OnLeave { reason } | Resolution::NoSchedule { reason } => reason.as_deref(),
            Resolution::Open(_) => None,
        }
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRecurringScheduleRequest {
    pub day_of_week: Weekday,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub hospital_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDateScheduleRequest {
    pub date: NaiveDate,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub hospital_id: Option<Uuid>,
}

/// Times are required when `is_available` is true; an unavailable override
/// covers the whole day when they are omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAvailabilityOverrideRequest {
    pub date: NaiveDate,
    pub start_time: Option<TimeOfDay>,
    pub end_time: Option<TimeOfDay>,
    pub is_available: bool,
    pub reason: Option<String>,
    pub hospital_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLeaveRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: Option<String>,
    pub status: Option<LeaveStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateLeaveStatusRequest {
    pub status: LeaveStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn only_approved_leave_blocks() {
        let mut leave = Leave {
            id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            start_date: date("2025-06-02"),
            end_date: date("2025-06-04"),
            reason: Some("Conference".to_string()),
            status: LeaveStatus::Pending,
        };
        assert!(!leave.blocks(date("2025-06-03")));

        leave.status = LeaveStatus::Approved;
        assert!(leave.blocks(date("2025-06-02")));
        assert!(leave.blocks(date("2025-06-04")));
        assert!(!leave.blocks(date("2025-06-05")));
    }

    #[test]
    fn doctor_defaults_from_directory_row() {
        let doctor: Doctor = serde_json::from_value(serde_json::json!({
            "id": Uuid::new_v4(),
            "full_name": "Dr. Ada"
        }))
        .unwrap();
        assert_eq!(doctor.appointment_duration_minutes, 30);
        assert_eq!(doctor.break_time_minutes, 0);
        assert!(!doctor.is_multi_site());
        assert!(doctor.is_affiliated(Uuid::new_v4()));
    }

    #[test]
    fn single_site_doctor_books_under_its_only_hospital() {
        let (home, elsewhere) = (Uuid::new_v4(), Uuid::new_v4());
        let single = Doctor::new(Uuid::new_v4(), "Dr. Ada").with_hospital(home, "Home Clinic");
        assert_eq!(single.booking_site(None), Some(home));
        assert_eq!(single.booking_site(Some(elsewhere)), Some(home));
        assert!(single.is_affiliated(home));
        assert!(!single.is_affiliated(elsewhere));

        let multi = single.with_hospital(elsewhere, "Other Clinic");
        assert!(multi.is_multi_site());
        assert_eq!(multi.booking_site(None), None);
        assert_eq!(multi.booking_site(Some(elsewhere)), Some(elsewhere));
    }
}
