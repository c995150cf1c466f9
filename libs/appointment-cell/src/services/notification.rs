use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use shared_models::time::TimeOfDay;

use crate::models::Appointment;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEvent {
    BookingCreated,
    CancellationRequested,
    CancellationApproved,
    CancellationRejected,
    AppointmentCancelled,
    AppointmentCompleted,
}

impl fmt::Display for NotificationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationEvent::BookingCreated => write!(f, "booking_created"),
            NotificationEvent::CancellationRequested => write!(f, "cancellation_requested"),
            NotificationEvent::CancellationApproved => write!(f, "cancellation_approved"),
            NotificationEvent::CancellationRejected => write!(f, "cancellation_rejected"),
            NotificationEvent::AppointmentCancelled => write!(f, "appointment_cancelled"),
            NotificationEvent::AppointmentCompleted => write!(f, "appointment_completed"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentNotification {
    pub event: NotificationEvent,
    pub appointment_id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub recipient_id: Uuid,
    pub date: NaiveDate,
    pub time: TimeOfDay,
    pub message: Option<String>,
}

impl AppointmentNotification {
    pub fn new(event: NotificationEvent, appointment: &Appointment, recipient_id: Uuid) -> Self {
        Self {
            event,
            appointment_id: appointment.id,
            doctor_id: appointment.doctor_id,
            patient_id: appointment.patient_id,
            recipient_id,
            date: appointment.date,
            time: appointment.time,
            message: None,
        }
    }

    pub fn with_message(mut self, message: Option<String>) -> Self {
        self.message = message;
        self
    }
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Notification channel closed")]
    ChannelClosed,
}

/// Hand-off point for appointment notifications. Implementations must not
/// block; callers log failures and carry on.
pub trait NotificationDispatcher: Send + Sync {
    fn dispatch(&self, notification: AppointmentNotification) -> Result<(), NotificationError>;
}

/// Dispatches and logs a failure instead of returning it.
pub fn dispatch_or_warn(
    dispatcher: &dyn NotificationDispatcher,
    notification: AppointmentNotification,
) {
    let event = notification.event;
    let appointment_id = notification.appointment_id;
    if let Err(e) = dispatcher.dispatch(notification) {
        warn!("Failed to dispatch {} for appointment {}: {}", event, appointment_id, e);
    }
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

impl NotificationDispatcher for TracingNotifier {
    fn dispatch(&self, notification: AppointmentNotification) -> Result<(), NotificationError> {
        info!(
            event = %notification.event,
            appointment_id = %notification.appointment_id,
            recipient_id = %notification.recipient_id,
            "Appointment notification for {} {}",
            notification.date,
            notification.time
        );
        Ok(())
    }
}

/// Queues notifications for a delivery worker.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<AppointmentNotification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AppointmentNotification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl NotificationDispatcher for ChannelNotifier {
    fn dispatch(&self, notification: AppointmentNotification) -> Result<(), NotificationError> {
        self.sender
            .send(notification)
            .map_err(|_| NotificationError::ChannelClosed)
    }
}
