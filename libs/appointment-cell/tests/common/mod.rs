#![allow(dead_code)]

use std::sync::Arc;

use chrono::{NaiveDate, Weekday};
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

use appointment_cell::models::{Appointment, BookAppointmentRequest, DayAvailability};
use appointment_cell::services::{AppointmentNotification, ChannelNotifier, InMemoryBookingStore};
use appointment_cell::AppState;
use doctor_cell::models::{
    CreateAvailabilityOverrideRequest, CreateDateScheduleRequest, CreateLeaveRequest,
    CreateRecurringScheduleRequest, Doctor, LeaveStatus,
};
use doctor_cell::services::{InMemoryScheduleStore, ScheduleService};
use shared_models::time::TimeOfDay;
use shared_utils::test_utils::TestConfig;

pub fn t(s: &str) -> TimeOfDay {
    s.parse().unwrap()
}

pub fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub struct Fixture {
    pub doctor: Doctor,
    pub state: AppState,
    pub schedules: Arc<ScheduleService>,
    pub bookings: Arc<InMemoryBookingStore>,
    pub notifications: UnboundedReceiver<AppointmentNotification>,
    pub config: TestConfig,
}

impl Fixture {
    pub async fn new(doctor: Doctor) -> Self {
        let config = TestConfig::default();
        let schedule_store = Arc::new(InMemoryScheduleStore::new());
        schedule_store.upsert_doctor(doctor.clone()).await;
        let schedules = Arc::new(ScheduleService::new(schedule_store.clone(), schedule_store));

        let bookings = Arc::new(InMemoryBookingStore::new());
        let (notifier, notifications) = ChannelNotifier::new();
        let state = AppState::new(
            config.to_arc(),
            schedules.clone(),
            bookings.clone(),
            Arc::new(notifier),
        );

        Self { doctor, state, schedules, bookings, notifications, config }
    }

    /// A doctor without hospital affiliations, 30 minute slots and no break.
    pub async fn default_doctor() -> Self {
        Self::new(Doctor::new(Uuid::new_v4(), "Dr. Mensah")).await
    }

    pub async fn weekly(&self, day: Weekday, start: &str, end: &str, hospital_id: Option<Uuid>) {
        self.schedules
            .create_recurring_schedule(
                self.doctor.id,
                CreateRecurringScheduleRequest {
                    day_of_week: day,
                    start_time: t(start),
                    end_time: t(end),
                    hospital_id,
                },
            )
            .await
            .unwrap();
    }

    pub async fn dated(&self, date: &str, start: &str, end: &str, hospital_id: Option<Uuid>) {
        self.schedules
            .create_date_schedule(
                self.doctor.id,
                CreateDateScheduleRequest {
                    date: d(date),
                    start_time: t(start),
                    end_time: t(end),
                    hospital_id,
                },
            )
            .await
            .unwrap();
    }

    pub async fn closed_on(&self, date: &str, reason: &str) {
        self.closed_at(date, reason, None).await;
    }

    pub async fn closed_at(&self, date: &str, reason: &str, hospital_id: Option<Uuid>) {
        self.schedules
            .create_availability_override(
                self.doctor.id,
                CreateAvailabilityOverrideRequest {
                    date: d(date),
                    start_time: None,
                    end_time: None,
                    is_available: false,
                    reason: Some(reason.to_string()),
                    hospital_id,
                },
            )
            .await
            .unwrap();
    }

    pub async fn open_on(&self, date: &str, start: &str, end: &str) {
        self.schedules
            .create_availability_override(
                self.doctor.id,
                CreateAvailabilityOverrideRequest {
                    date: d(date),
                    start_time: Some(t(start)),
                    end_time: Some(t(end)),
                    is_available: true,
                    reason: None,
                    hospital_id: None,
                },
            )
            .await
            .unwrap();
    }

    pub async fn approved_leave(&self, start: &str, end: &str, reason: &str) {
        self.schedules
            .create_leave(
                self.doctor.id,
                CreateLeaveRequest {
                    start_date: d(start),
                    end_date: d(end),
                    reason: Some(reason.to_string()),
                    status: Some(LeaveStatus::Approved),
                },
            )
            .await
            .unwrap();
    }

    pub fn booking(&self, patient_id: Uuid, date: &str, time: &str) -> BookAppointmentRequest {
        BookAppointmentRequest {
            doctor_id: self.doctor.id,
            patient_id,
            date: d(date),
            time: t(time),
            hospital_id: None,
        }
    }

    pub async fn day(&self, date: &str) -> DayAvailability {
        self.state.availability.get_availability(self.doctor.id, d(date), None).await.unwrap()
    }

    pub async fn slot_free(&self, date: &str, time: &str) -> bool {
        self.state
            .availability
            .is_slot_available(self.doctor.id, d(date), t(time), None)
            .await
            .unwrap()
    }

    pub async fn book_at(&self, patient_id: Uuid, date: &str, time: &str) -> Appointment {
        self.state.booking.book(self.booking(patient_id, date, time)).await.unwrap()
    }

    pub fn drain_notifications(&mut self) -> Vec<AppointmentNotification> {
        let mut drained = Vec::new();
        while let Ok(notification) = self.notifications.try_recv() {
            drained.push(notification);
        }
        drained
    }
}
