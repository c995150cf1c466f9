use std::sync::Arc;

use doctor_cell::services::ScheduleService;
use shared_config::AppConfig;

use crate::services::{
    AppointmentBookingService, AvailabilityService, BookingStore, CancellationWorkflow,
    NotificationDispatcher,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub availability: Arc<AvailabilityService>,
    pub booking: Arc<AppointmentBookingService>,
    pub workflow: Arc<CancellationWorkflow>,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        schedules: Arc<ScheduleService>,
        bookings: Arc<dyn BookingStore>,
        notifier: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self {
            availability: Arc::new(AvailabilityService::new(
                schedules.clone(),
                bookings.clone(),
                config.max_availability_range_days,
            )),
            booking: Arc::new(AppointmentBookingService::new(
                schedules,
                bookings.clone(),
                notifier.clone(),
            )),
            workflow: Arc::new(CancellationWorkflow::new(
                bookings,
                notifier,
                config.min_cancellation_reason_length,
            )),
            config,
        }
    }
}
