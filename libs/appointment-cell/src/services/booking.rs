// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use doctor_cell::models::Resolution;
use doctor_cell::services::{ScheduleResolver, ScheduleService};

use crate::models::{Appointment, AppointmentError, BookAppointmentRequest, SlotKey};
use crate::services::availability::{ensure_affiliated, hospitals_offering};
use crate::services::notification::{
    dispatch_or_warn, AppointmentNotification, NotificationDispatcher, NotificationEvent,
};
use crate::services::store::BookingStore;

/// Picks the hospital a booking lands on. A filter that names one of the
/// offering hospitals wins; otherwise the time must be offered exactly once.
fn choose_hospital(
    offering: &[Option<Uuid>],
    filter: Option<Uuid>,
    request: &BookAppointmentRequest,
) -> Result<Option<Uuid>, AppointmentError> {
    if filter.is_some() && offering.contains(&filter) {
        return Ok(filter);
    }
    match offering {
        [] => Err(AppointmentError::SlotNotOffered { date: request.date, time: request.time }),
        [only] => Ok(*only),
        many => Err(AppointmentError::AmbiguousHospital {
            time: request.time,
            hospitals: many.to_vec(),
        }),
    }
}

pub struct AppointmentBookingService {
    schedules: Arc<ScheduleService>,
    bookings: Arc<dyn BookingStore>,
    notifier: Arc<dyn NotificationDispatcher>,
}

impl AppointmentBookingService {
    pub fn new(
        schedules: Arc<ScheduleService>,
        bookings: Arc<dyn BookingStore>,
        notifier: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self { schedules, bookings, notifier }
    }

    /// Book a slot. Exactly one of any set of concurrent calls for the same
    /// slot succeeds; the rest get `SlotConflict`.
    pub async fn book(
        &self,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        debug!(
            "Booking doctor {} for patient {} at {} {}",
            request.doctor_id, request.patient_id, request.date, request.time
        );

        if request.doctor_id.is_nil() || request.patient_id.is_nil() {
            return Err(AppointmentError::ValidationError(
                "doctor_id and patient_id are required".to_string(),
            ));
        }

        let doctor = self.schedules.get_doctor(request.doctor_id).await?;
        ensure_affiliated(&doctor, request.hospital_id)?;
        let calendar = self
            .schedules
            .calendar(request.doctor_id, request.date, request.date)
            .await?;

        let resolution =
            ScheduleResolver::resolve(&doctor, &calendar, request.date, request.hospital_id);
        match &resolution {
            Resolution::OnLeave { reason } => {
                return Err(AppointmentError::OnLeave { reason: reason.clone() })
            }
            Resolution::NoSchedule { reason } => {
                return Err(AppointmentError::NoSchedule { reason: reason.clone() })
            }
            Resolution::Open(_) => {}
        }

        let offering = hospitals_offering(&resolution, &doctor, request.time);
        let hospital_id = choose_hospital(&offering, request.hospital_id, &request)?;
        let slot = SlotKey {
            doctor_id: request.doctor_id,
            date: request.date,
            time: request.time,
            hospital_id,
        };

        // Fail fast; the insert below is the real guard.
        if let Some(existing) = self.bookings.find_active(&slot).await? {
            warn!("Slot {:?} already held by appointment {}", slot, existing.id);
            return Err(AppointmentError::SlotConflict);
        }

        let appointment =
            Appointment::new(slot, request.patient_id, doctor.appointment_duration_minutes);
        let created = self.bookings.insert(appointment).await?;

        info!(
            "Appointment {} booked: doctor {} on {} at {} (hospital {:?})",
            created.id, created.doctor_id, created.date, created.time, created.hospital_id
        );

        for recipient in [created.patient_id, created.doctor_id] {
            dispatch_or_warn(
                self.notifier.as_ref(),
                AppointmentNotification::new(
                    NotificationEvent::BookingCreated,
                    &created,
                    recipient,
                ),
            );
        }

        Ok(created)
    }
}
