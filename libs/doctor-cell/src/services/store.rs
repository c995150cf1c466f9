use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::ScheduleError;
use crate::models::{
    AvailabilityOverride, DateSchedule, Doctor, DoctorCalendar, Leave, LeaveStatus,
    RecurringSchedule, ScheduleKind,
};

/// Read-only doctor lookup, owned by the doctor directory.
#[async_trait]
pub trait DoctorDirectory: Send + Sync {
    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, ScheduleError>;
}

/// Persistence for schedules, overrides and leave.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Loads all recurring schedules plus the date-bound records touching
    /// `from..=to`.
    async fn load_calendar(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<DoctorCalendar, ScheduleError>;

    async fn insert_recurring(
        &self,
        schedule: RecurringSchedule,
    ) -> Result<RecurringSchedule, ScheduleError>;

    async fn insert_date_schedule(
        &self,
        schedule: DateSchedule,
    ) -> Result<DateSchedule, ScheduleError>;

    async fn insert_override(
        &self,
        entry: AvailabilityOverride,
    ) -> Result<AvailabilityOverride, ScheduleError>;

    async fn insert_leave(&self, leave: Leave) -> Result<Leave, ScheduleError>;

    async fn update_leave_status(
        &self,
        doctor_id: Uuid,
        leave_id: Uuid,
        status: LeaveStatus,
    ) -> Result<Leave, ScheduleError>;

    /// Removes an entry owned by `doctor_id`.
    async fn delete(
        &self,
        doctor_id: Uuid,
        kind: ScheduleKind,
        id: Uuid,
    ) -> Result<(), ScheduleError>;
}

#[derive(Default)]
struct ScheduleArena {
    doctors: HashMap<Uuid, Doctor>,
    recurring: HashMap<Uuid, RecurringSchedule>,
    date_schedules: HashMap<Uuid, DateSchedule>,
    overrides: HashMap<Uuid, AvailabilityOverride>,
    leaves: HashMap<Uuid, Leave>,
}

/// Process-local store keyed by record id. Readers take a consistent
/// snapshot under a shared lock.
#[derive(Default)]
pub struct InMemoryScheduleStore {
    arena: RwLock<ScheduleArena>,
}

impl InMemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the directory side of the store.
    pub async fn upsert_doctor(&self, doctor: Doctor) {
        self.arena.write().await.doctors.insert(doctor.id, doctor);
    }
}

fn owned_by<'a, T>(
    map: &'a HashMap<Uuid, T>,
    id: Uuid,
    kind: ScheduleKind,
    doctor_id: Uuid,
    owner: impl Fn(&T) -> Uuid,
) -> Result<&'a T, ScheduleError> {
    map.get(&id)
        .filter(|entry| owner(entry) == doctor_id)
        .ok_or(ScheduleError::EntryNotFound { kind, id })
}

#[async_trait]
impl DoctorDirectory for InMemoryScheduleStore {
    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, ScheduleError> {
        Ok(self.arena.read().await.doctors.get(&doctor_id).cloned())
    }
}

#[async_trait]
impl ScheduleStore for InMemoryScheduleStore {
    async fn load_calendar(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<DoctorCalendar, ScheduleError> {
        let arena = self.arena.read().await;
        let in_range = |date: NaiveDate| from <= date && date <= to;

        let calendar = DoctorCalendar {
            doctor_id,
            recurring: arena
                .recurring
                .values()
                .filter(|s| s.doctor_id == doctor_id)
                .cloned()
                .collect(),
            date_schedules: arena
                .date_schedules
                .values()
                .filter(|s| s.doctor_id == doctor_id && in_range(s.date))
                .cloned()
                .collect(),
            overrides: arena
                .overrides
                .values()
                .filter(|o| o.doctor_id == doctor_id && in_range(o.date))
                .cloned()
                .collect(),
            leaves: arena
                .leaves
                .values()
                .filter(|l| l.doctor_id == doctor_id && l.overlaps_range(from, to))
                .cloned()
                .collect(),
        };

        debug!(
            "Loaded calendar for doctor {} ({} recurring, {} dated, {} overrides, {} leaves)",
            doctor_id,
            calendar.recurring.len(),
            calendar.date_schedules.len(),
            calendar.overrides.len(),
            calendar.leaves.len()
        );
        Ok(calendar)
    }

    async fn insert_recurring(
        &self,
        schedule: RecurringSchedule,
    ) -> Result<RecurringSchedule, ScheduleError> {
        self.arena.write().await.recurring.insert(schedule.id, schedule.clone());
        Ok(schedule)
    }

    async fn insert_date_schedule(
        &self,
        schedule: DateSchedule,
    ) -> Result<DateSchedule, ScheduleError> {
        self.arena.write().await.date_schedules.insert(schedule.id, schedule.clone());
        Ok(schedule)
    }

    async fn insert_override(
        &self,
        entry: AvailabilityOverride,
    ) -> Result<AvailabilityOverride, ScheduleError> {
        let mut arena = self.arena.write().await;
        let duplicate = arena.overrides.values().any(|o| {
            o.doctor_id == entry.doctor_id
                && o.date == entry.date
                && o.hospital_id == entry.hospital_id
        });
        if duplicate {
            return Err(ScheduleError::DuplicateOverride(entry.date));
        }
        arena.overrides.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn insert_leave(&self, leave: Leave) -> Result<Leave, ScheduleError> {
        self.arena.write().await.leaves.insert(leave.id, leave.clone());
        Ok(leave)
    }

    async fn update_leave_status(
        &self,
        doctor_id: Uuid,
        leave_id: Uuid,
        status: LeaveStatus,
    ) -> Result<Leave, ScheduleError> {
        let mut arena = self.arena.write().await;
        let leave = arena
            .leaves
            .get_mut(&leave_id)
            .filter(|l| l.doctor_id == doctor_id)
            .ok_or(ScheduleError::EntryNotFound { kind: ScheduleKind::Leave, id: leave_id })?;
        leave.status = status;
        Ok(leave.clone())
    }

    async fn delete(
        &self,
        doctor_id: Uuid,
        kind: ScheduleKind,
        id: Uuid,
    ) -> Result<(), ScheduleError> {
        let mut arena = self.arena.write().await;
        match kind {
            ScheduleKind::Recurring => {
                owned_by(&arena.recurring, id, kind, doctor_id, |s| s.doctor_id)?;
                arena.recurring.remove(&id);
            }
            ScheduleKind::Dated => {
                owned_by(&arena.date_schedules, id, kind, doctor_id, |s| s.doctor_id)?;
                arena.date_schedules.remove(&id);
            }
            ScheduleKind::Override => {
                owned_by(&arena.overrides, id, kind, doctor_id, |o| o.doctor_id)?;
                arena.overrides.remove(&id);
            }
            ScheduleKind::Leave => {
                owned_by(&arena.leaves, id, kind, doctor_id, |l| l.doctor_id)?;
                arena.leaves.remove(&id);
            }
        }
        debug!("Deleted {} {} for doctor {}", kind, id, doctor_id);
        Ok(())
    }
}
