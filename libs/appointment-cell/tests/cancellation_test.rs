mod common;

use assert_matches::assert_matches;
use chrono::Weekday;
use uuid::Uuid;

use appointment_cell::models::{Appointment, AppointmentError, AppointmentStatus};
use appointment_cell::services::NotificationEvent;

use common::{d, t, Fixture};

const REASON: &str = "Family emergency, need to travel";

async fn booked(fx: &mut Fixture, patient: Uuid) -> Appointment {
    fx.weekly(Weekday::Mon, "09:00", "10:00", None).await;
    let appointment = fx.book_at(patient, "2025-07-07", "09:00").await;
    fx.drain_notifications();
    appointment
}

async fn slot_open(fx: &Fixture) -> bool {
    fx.state
        .availability
        .is_slot_available(fx.doctor.id, d("2025-07-07"), t("09:00"), None)
        .await
        .unwrap()
}

#[tokio::test]
async fn approved_cancellation_frees_the_slot() {
    let mut fx = Fixture::default_doctor().await;
    let patient = Uuid::new_v4();
    let appointment = booked(&mut fx, patient).await;
    assert!(!slot_open(&fx).await);

    let requested = fx
        .state
        .workflow
        .request_cancellation(appointment.id, patient, REASON)
        .await
        .unwrap();
    assert_eq!(requested.status, AppointmentStatus::CancellationRequested);
    assert_eq!(requested.cancellation_reason.as_deref(), Some(REASON));
    assert_eq!(requested.cancellation_requested_by, Some(patient));
    assert!(requested.cancellation_requested_at.is_some());
    // a pending request still holds the slot
    assert!(!slot_open(&fx).await);

    let approved = fx
        .state
        .workflow
        .approve_cancellation(appointment.id, fx.doctor.id, Some("Take care".to_string()))
        .await
        .unwrap();
    assert_eq!(approved.status, AppointmentStatus::Cancelled);
    assert_eq!(approved.resolved_by, Some(fx.doctor.id));
    assert!(approved.cancelled_at.is_some());

    assert!(slot_open(&fx).await);
    let rebooked = fx.state.booking.book(fx.booking(Uuid::new_v4(), "2025-07-07", "09:00")).await;
    assert!(rebooked.is_ok());
}

#[tokio::test]
async fn rejected_cancellation_restores_the_booking() {
    let mut fx = Fixture::default_doctor().await;
    let patient = Uuid::new_v4();
    let appointment = booked(&mut fx, patient).await;

    fx.state
        .workflow
        .request_cancellation(appointment.id, patient, REASON)
        .await
        .unwrap();
    let rejected = fx
        .state
        .workflow
        .reject_cancellation(
            appointment.id,
            fx.doctor.id,
            Some("Please reschedule instead".to_string()),
        )
        .await
        .unwrap();

    assert_eq!(rejected.status, AppointmentStatus::Scheduled);
    assert_eq!(rejected.resolution_note.as_deref(), Some("Please reschedule instead"));
    assert!(!slot_open(&fx).await);

    let day = fx.day("2025-07-07").await;
    assert!(!day.slots[0].available);
}

#[tokio::test]
async fn short_reason_is_rejected_without_change() {
    let mut fx = Fixture::default_doctor().await;
    let patient = Uuid::new_v4();
    let appointment = booked(&mut fx, patient).await;

    let result = fx
        .state
        .workflow
        .request_cancellation(appointment.id, patient, "   sick    ")
        .await;
    assert_matches!(result, Err(AppointmentError::ValidationError(_)));

    let unchanged = fx.state.workflow.get_appointment(appointment.id).await.unwrap();
    assert_eq!(unchanged.status, AppointmentStatus::Scheduled);
    assert!(fx.drain_notifications().is_empty());
}

#[tokio::test]
async fn second_request_is_an_invalid_transition() {
    let mut fx = Fixture::default_doctor().await;
    let patient = Uuid::new_v4();
    let appointment = booked(&mut fx, patient).await;

    fx.state
        .workflow
        .request_cancellation(appointment.id, patient, REASON)
        .await
        .unwrap();
    let again = fx
        .state
        .workflow
        .request_cancellation(appointment.id, patient, REASON)
        .await;

    assert_matches!(
        again,
        Err(AppointmentError::InvalidStateTransition {
            from: AppointmentStatus::CancellationRequested,
            ..
        })
    );
}

#[tokio::test]
async fn approval_needs_a_pending_request() {
    let mut fx = Fixture::default_doctor().await;
    let appointment = booked(&mut fx, Uuid::new_v4()).await;

    let approve = fx.state.workflow.approve_cancellation(appointment.id, fx.doctor.id, None).await;
    assert_matches!(
        approve,
        Err(AppointmentError::InvalidStateTransition { from: AppointmentStatus::Scheduled, .. })
    );

    let reject = fx.state.workflow.reject_cancellation(appointment.id, fx.doctor.id, None).await;
    assert_matches!(reject, Err(AppointmentError::InvalidStateTransition { .. }));
}

#[tokio::test]
async fn cancelled_appointment_is_terminal() {
    let mut fx = Fixture::default_doctor().await;
    let patient = Uuid::new_v4();
    let appointment = booked(&mut fx, patient).await;

    let cancelled = fx
        .state
        .workflow
        .direct_cancel(appointment.id, patient, Some("  Feeling better  ".to_string()))
        .await
        .unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("Feeling better"));
    assert!(slot_open(&fx).await);

    for result in [
        fx.state.workflow.request_cancellation(appointment.id, patient, REASON).await,
        fx.state.workflow.direct_cancel(appointment.id, patient, None).await,
        fx.state.workflow.mark_completed(appointment.id).await,
    ] {
        assert_matches!(
            result,
            Err(AppointmentError::InvalidStateTransition { from: AppointmentStatus::Cancelled, .. })
        );
    }
}

#[tokio::test]
async fn completed_appointment_keeps_its_slot() {
    let mut fx = Fixture::default_doctor().await;
    let patient = Uuid::new_v4();
    let appointment = booked(&mut fx, patient).await;

    let completed = fx.state.workflow.mark_completed(appointment.id).await.unwrap();
    assert_eq!(completed.status, AppointmentStatus::Completed);
    assert!(completed.completed_at.is_some());
    assert!(!slot_open(&fx).await);

    let sent = fx.drain_notifications();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].event, NotificationEvent::AppointmentCompleted);
    assert_eq!(sent[0].recipient_id, patient);

    let cancel = fx.state.workflow.direct_cancel(appointment.id, patient, None).await;
    assert_matches!(cancel, Err(AppointmentError::InvalidStateTransition { .. }));
}

#[tokio::test]
async fn unknown_appointment_is_not_found() {
    let fx = Fixture::default_doctor().await;
    let missing = Uuid::new_v4();

    let result = fx.state.workflow.request_cancellation(missing, Uuid::new_v4(), REASON).await;
    assert_matches!(result, Err(AppointmentError::NotFound(id)) if id == missing);
}

#[tokio::test]
async fn notifications_reach_the_other_party() {
    let mut fx = Fixture::default_doctor().await;
    let patient = Uuid::new_v4();
    let appointment = booked(&mut fx, patient).await;

    fx.state
        .workflow
        .request_cancellation(appointment.id, patient, REASON)
        .await
        .unwrap();
    let sent = fx.drain_notifications();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].event, NotificationEvent::CancellationRequested);
    assert_eq!(sent[0].recipient_id, fx.doctor.id);
    assert_eq!(sent[0].message.as_deref(), Some(REASON));

    fx.state
        .workflow
        .approve_cancellation(appointment.id, fx.doctor.id, None)
        .await
        .unwrap();
    let sent = fx.drain_notifications();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].event, NotificationEvent::CancellationApproved);
    assert_eq!(sent[0].recipient_id, patient);
}

#[tokio::test]
async fn doctor_request_is_answered_to_the_doctor() {
    let mut fx = Fixture::default_doctor().await;
    let patient = Uuid::new_v4();
    let appointment = booked(&mut fx, patient).await;

    fx.state
        .workflow
        .request_cancellation(appointment.id, fx.doctor.id, "Clinic closed for repairs")
        .await
        .unwrap();
    assert_eq!(fx.drain_notifications()[0].recipient_id, patient);

    let admin = Uuid::new_v4();
    fx.state
        .workflow
        .reject_cancellation(appointment.id, admin, None)
        .await
        .unwrap();
    let sent = fx.drain_notifications();
    assert_eq!(sent[0].event, NotificationEvent::CancellationRejected);
    assert_eq!(sent[0].recipient_id, fx.doctor.id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn racing_approve_and_reject_settle_once() {
    let mut fx = Fixture::default_doctor().await;
    let patient = Uuid::new_v4();
    let appointment = booked(&mut fx, patient).await;
    fx.state
        .workflow
        .request_cancellation(appointment.id, patient, REASON)
        .await
        .unwrap();

    let (approver, rejecter) = (fx.state.workflow.clone(), fx.state.workflow.clone());
    let doctor = fx.doctor.id;
    let id = appointment.id;
    let approve =
        tokio::spawn(async move { approver.approve_cancellation(id, doctor, None).await });
    let reject =
        tokio::spawn(async move { rejecter.reject_cancellation(id, doctor, None).await });

    let results = [approve.await.unwrap(), reject.await.unwrap()];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(AppointmentError::InvalidStateTransition { .. }))));
}
