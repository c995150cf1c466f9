use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::SupabaseError;

use crate::models::{Appointment, AppointmentError, AppointmentStatus, SlotKey, StatusChange};

#[derive(Debug, Error)]
pub enum BookingStoreError {
    #[error("Slot already holds an active appointment")]
    SlotTaken,

    #[error("Appointment not found: {0}")]
    NotFound(Uuid),

    #[error("Appointment status is {actual}, expected {expected}")]
    StatusMismatch {
        expected: AppointmentStatus,
        actual: AppointmentStatus,
    },

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<SupabaseError> for BookingStoreError {
    fn from(err: SupabaseError) -> Self {
        match err {
            SupabaseError::Conflict(_) => BookingStoreError::SlotTaken,
            other => BookingStoreError::Storage(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for BookingStoreError {
    fn from(err: serde_json::Error) -> Self {
        BookingStoreError::Storage(format!("Failed to parse appointment row: {}", err))
    }
}

impl From<BookingStoreError> for AppointmentError {
    fn from(err: BookingStoreError) -> Self {
        match err {
            BookingStoreError::SlotTaken => AppointmentError::SlotConflict,
            BookingStoreError::NotFound(id) => AppointmentError::NotFound(id),
            BookingStoreError::StatusMismatch { actual, .. } => {
                AppointmentError::InvalidStateTransition {
                    from: actual,
                    action: "update".to_string(),
                }
            }
            BookingStoreError::Storage(msg) => AppointmentError::DatabaseError(msg),
        }
    }
}

/// Appointment persistence with a uniqueness guarantee on active slots.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Inserts the appointment unless its slot already holds an active one,
    /// in which case `SlotTaken` is returned and nothing is written.
    async fn insert(&self, appointment: Appointment) -> Result<Appointment, BookingStoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, BookingStoreError>;

    async fn find_active(&self, slot: &SlotKey) -> Result<Option<Appointment>, BookingStoreError>;

    /// Active appointments of a doctor with `from <= date <= to`.
    async fn list_active(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Appointment>, BookingStoreError>;

    /// Applies `change` only if the stored status equals `expected`.
    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        change: StatusChange,
    ) -> Result<Appointment, BookingStoreError>;
}

/// Process-local booking store.
///
/// `slots` indexes active appointments by slot; its entry lock is the
/// per-slot critical section for inserts. Lock order is always `slots`
/// then `appointments`, and status changes release the appointment entry
/// before touching the index.
#[derive(Default)]
pub struct InMemoryBookingStore {
    appointments: DashMap<Uuid, Appointment>,
    slots: DashMap<SlotKey, Uuid>,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.appointments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.appointments.is_empty()
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn insert(&self, appointment: Appointment) -> Result<Appointment, BookingStoreError> {
        let key = appointment.slot_key();
        match self.slots.entry(key) {
            Entry::Occupied(existing) => {
                warn!("Slot {:?} already held by appointment {}", key, existing.get());
                Err(BookingStoreError::SlotTaken)
            }
            Entry::Vacant(vacant) => {
                self.appointments.insert(appointment.id, appointment.clone());
                vacant.insert(appointment.id);
                Ok(appointment)
            }
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, BookingStoreError> {
        Ok(self.appointments.get(&id).map(|a| a.value().clone()))
    }

    async fn find_active(&self, slot: &SlotKey) -> Result<Option<Appointment>, BookingStoreError> {
        let Some(id) = self.slots.get(slot).map(|entry| *entry.value()) else {
            return Ok(None);
        };
        Ok(self
            .appointments
            .get(&id)
            .map(|a| a.value().clone())
            .filter(Appointment::is_active))
    }

    async fn list_active(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Appointment>, BookingStoreError> {
        let active: Vec<Appointment> = self
            .appointments
            .iter()
            .filter(|a| a.doctor_id == doctor_id && a.is_active() && from <= a.date && a.date <= to)
            .map(|a| a.value().clone())
            .collect();
        debug!(
            "{} active appointments for doctor {} in {}..={}",
            active.len(),
            doctor_id,
            from,
            to
        );
        Ok(active)
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        change: StatusChange,
    ) -> Result<Appointment, BookingStoreError> {
        let updated = {
            let mut entry = self
                .appointments
                .get_mut(&id)
                .ok_or(BookingStoreError::NotFound(id))?;
            if entry.status != expected {
                return Err(BookingStoreError::StatusMismatch { expected, actual: entry.status });
            }
            change.apply(entry.value_mut());
            entry.value().clone()
        };

        if !updated.is_active() {
            self.slots.remove_if(&updated.slot_key(), |_, holder| *holder == id);
        }
        Ok(updated)
    }
}
