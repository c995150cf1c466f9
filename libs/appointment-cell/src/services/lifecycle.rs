// libs/appointment-cell/src/services/lifecycle.rs
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{Appointment, AppointmentError, AppointmentStatus, StatusChange};
use crate::services::notification::{
    dispatch_or_warn, AppointmentNotification, NotificationDispatcher, NotificationEvent,
};
use crate::services::store::{BookingStore, BookingStoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    RequestCancellation,
    ApproveCancellation,
    RejectCancellation,
    Cancel,
    Complete,
}

impl fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleAction::RequestCancellation => write!(f, "request cancellation of"),
            LifecycleAction::ApproveCancellation => write!(f, "approve cancellation of"),
            LifecycleAction::RejectCancellation => write!(f, "reject cancellation of"),
            LifecycleAction::Cancel => write!(f, "cancel"),
            LifecycleAction::Complete => write!(f, "complete"),
        }
    }
}

pub struct AppointmentLifecycleService;

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// The status an action leads to, if allowed from `current`.
    pub fn next_status(
        &self,
        current: AppointmentStatus,
        action: LifecycleAction,
    ) -> Option<AppointmentStatus> {
        use AppointmentStatus::*;
        use LifecycleAction::*;

        if current.is_terminal() {
            return None;
        }
        match (current, action) {
            (Scheduled, RequestCancellation) => Some(CancellationRequested),
            (CancellationRequested, ApproveCancellation) => Some(Cancelled),
            (CancellationRequested, RejectCancellation) => Some(Scheduled),
            (Scheduled, Cancel) => Some(Cancelled),
            (Scheduled, Complete) => Some(Completed),
            _ => None,
        }
    }

    /// Validate that an action is allowed from the current status
    pub fn validate_status_transition(
        &self,
        current: AppointmentStatus,
        action: LifecycleAction,
    ) -> Result<AppointmentStatus, AppointmentError> {
        debug!("Validating {:?} from {}", action, current);

        self.next_status(current, action).ok_or_else(|| {
            warn!("Invalid status transition attempted: {:?} from {}", action, current);
            AppointmentError::InvalidStateTransition { from: current, action: action.to_string() }
        })
    }

    /// Get all valid next statuses for a given current status
    pub fn get_valid_transitions(&self, current: AppointmentStatus) -> Vec<AppointmentStatus> {
        [
            LifecycleAction::RequestCancellation,
            LifecycleAction::ApproveCancellation,
            LifecycleAction::RejectCancellation,
            LifecycleAction::Cancel,
            LifecycleAction::Complete,
        ]
        .into_iter()
        .filter_map(|action| self.next_status(current, action))
        .fold(Vec::new(), |mut acc, status| {
            if !acc.contains(&status) {
                acc.push(status);
            }
            acc
        })
    }
}

/// Drives appointments through the cancellation and completion states.
/// Every transition is a compare-and-swap against the status read first.
pub struct CancellationWorkflow {
    bookings: Arc<dyn BookingStore>,
    notifier: Arc<dyn NotificationDispatcher>,
    lifecycle: AppointmentLifecycleService,
    min_reason_length: usize,
}

impl CancellationWorkflow {
    pub fn new(
        bookings: Arc<dyn BookingStore>,
        notifier: Arc<dyn NotificationDispatcher>,
        min_reason_length: usize,
    ) -> Self {
        Self {
            bookings,
            notifier,
            lifecycle: AppointmentLifecycleService::new(),
            min_reason_length,
        }
    }

    pub async fn get_appointment(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        self.bookings.get(id).await?.ok_or(AppointmentError::NotFound(id))
    }

    async fn transition(
        &self,
        id: Uuid,
        action: LifecycleAction,
        fill: impl FnOnce(&mut StatusChange),
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get_appointment(id).await?;
        let next = self.lifecycle.validate_status_transition(current.status, action)?;

        let mut change = StatusChange::to(next);
        fill(&mut change);

        let updated = self
            .bookings
            .compare_and_set_status(id, current.status, change)
            .await
            .map_err(|e| match e {
                BookingStoreError::StatusMismatch { actual, .. } => {
                    warn!("Appointment {} changed to {} before {:?} applied", id, actual, action);
                    AppointmentError::InvalidStateTransition {
                        from: actual,
                        action: action.to_string(),
                    }
                }
                other => other.into(),
            })?;

        info!("Appointment {}: {} -> {}", id, current.status, updated.status);
        Ok(updated)
    }

    fn notify(
        &self,
        event: NotificationEvent,
        appointment: &Appointment,
        recipient: Uuid,
        message: Option<String>,
    ) {
        dispatch_or_warn(
            self.notifier.as_ref(),
            AppointmentNotification::new(event, appointment, recipient).with_message(message),
        );
    }

    /// The other party of an appointment relative to `actor`.
    fn counterpart(appointment: &Appointment, actor: Uuid) -> Uuid {
        if actor == appointment.patient_id {
            appointment.doctor_id
        } else {
            appointment.patient_id
        }
    }

    pub async fn request_cancellation(
        &self,
        id: Uuid,
        requested_by: Uuid,
        reason: &str,
    ) -> Result<Appointment, AppointmentError> {
        let reason = reason.trim();
        if reason.chars().count() < self.min_reason_length {
            return Err(AppointmentError::ValidationError(format!(
                "Cancellation reason must be at least {} characters",
                self.min_reason_length
            )));
        }

        let updated = self
            .transition(id, LifecycleAction::RequestCancellation, |change| {
                change.cancellation_reason = Some(reason.to_string());
                change.cancellation_requested_by = Some(requested_by);
                change.cancellation_requested_at = Some(Utc::now());
            })
            .await?;

        self.notify(
            NotificationEvent::CancellationRequested,
            &updated,
            Self::counterpart(&updated, requested_by),
            Some(reason.to_string()),
        );
        Ok(updated)
    }

    pub async fn approve_cancellation(
        &self,
        id: Uuid,
        approver_id: Uuid,
        note: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        let updated = self
            .transition(id, LifecycleAction::ApproveCancellation, |change| {
                change.resolved_by = Some(approver_id);
                change.resolution_note = note.clone();
                change.cancelled_at = Some(Utc::now());
            })
            .await?;

        let requester = updated.cancellation_requested_by.unwrap_or(updated.patient_id);
        self.notify(NotificationEvent::CancellationApproved, &updated, requester, note);
        Ok(updated)
    }

    pub async fn reject_cancellation(
        &self,
        id: Uuid,
        rejecter_id: Uuid,
        reason: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        let updated = self
            .transition(id, LifecycleAction::RejectCancellation, |change| {
                change.resolved_by = Some(rejecter_id);
                change.resolution_note = reason.clone();
            })
            .await?;

        let requester = updated.cancellation_requested_by.unwrap_or(updated.patient_id);
        self.notify(NotificationEvent::CancellationRejected, &updated, requester, reason);
        Ok(updated)
    }

    pub async fn direct_cancel(
        &self,
        id: Uuid,
        actor_id: Uuid,
        reason: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        let reason = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        let updated = self
            .transition(id, LifecycleAction::Cancel, |change| {
                change.cancellation_reason = reason.clone();
                change.resolved_by = Some(actor_id);
                change.cancelled_at = Some(Utc::now());
            })
            .await?;

        self.notify(
            NotificationEvent::AppointmentCancelled,
            &updated,
            Self::counterpart(&updated, actor_id),
            reason,
        );
        Ok(updated)
    }

    pub async fn mark_completed(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        let updated = self
            .transition(id, LifecycleAction::Complete, |change| {
                change.completed_at = Some(Utc::now());
            })
            .await?;

        self.notify(NotificationEvent::AppointmentCompleted, &updated, updated.patient_id, None);
        Ok(updated)
    }
}
