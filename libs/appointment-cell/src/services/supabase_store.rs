use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{Appointment, AppointmentStatus, SlotKey, StatusChange};
use crate::services::store::{BookingStore, BookingStoreError};

const APPOINTMENTS: &str = "/rest/v1/appointments";

/// Booking store backed by the `appointments` table.
///
/// Slot uniqueness relies on a partial unique index over
/// `(doctor_id, date, time, coalesce(hospital_id, nil uuid)) where status <> 'cancelled'`;
/// PostgREST reports a violation as 409.
pub struct SupabaseBookingStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseBookingStore {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)))
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn select(&self, path: String) -> Result<Vec<Appointment>, BookingStoreError> {
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, self.supabase.service_token(), None)
            .await?;

        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(BookingStoreError::from))
            .collect()
    }
}

fn hospital_filter(hospital_id: Option<Uuid>) -> String {
    match hospital_id {
        Some(h) => format!("hospital_id=eq.{}", h),
        None => "hospital_id=is.null".to_string(),
    }
}

#[async_trait]
impl BookingStore for SupabaseBookingStore {
    async fn insert(&self, appointment: Appointment) -> Result<Appointment, BookingStoreError> {
        let rows: Vec<Appointment> = self
            .supabase
            .request_with_headers(
                Method::POST,
                APPOINTMENTS,
                self.supabase.service_token(),
                Some(serde_json::to_value(&appointment)?),
                Some(SupabaseClient::return_representation()),
            )
            .await
            .map_err(|e| {
                let err = BookingStoreError::from(e);
                if matches!(err, BookingStoreError::SlotTaken) {
                    warn!("Slot {:?} taken by a concurrent booking", appointment.slot_key());
                }
                err
            })?;

        let created = rows
            .into_iter()
            .next()
            .ok_or_else(|| {
                BookingStoreError::Storage("Appointment insert returned no rows".to_string())
            })?;
        info!("Appointment {} stored for doctor {}", created.id, created.doctor_id);
        Ok(created)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, BookingStoreError> {
        let rows = self.select(format!("{}?id=eq.{}", APPOINTMENTS, id)).await?;
        Ok(rows.into_iter().next())
    }

    async fn find_active(&self, slot: &SlotKey) -> Result<Option<Appointment>, BookingStoreError> {
        let path = format!(
            "{}?doctor_id=eq.{}&date=eq.{}&time=eq.{}&{}&status=neq.cancelled",
            APPOINTMENTS,
            slot.doctor_id,
            slot.date,
            slot.time,
            hospital_filter(slot.hospital_id)
        );
        let rows = self.select(path).await?;
        Ok(rows.into_iter().next())
    }

    async fn list_active(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Appointment>, BookingStoreError> {
        let path = format!(
            "{}?doctor_id=eq.{}&date=gte.{}&date=lte.{}\
             &status=neq.cancelled&order=date.asc,time.asc",
            APPOINTMENTS, doctor_id, from, to
        );
        let rows = self.select(path).await?;
        debug!("{} active appointments for doctor {} in {}..={}", rows.len(), doctor_id, from, to);
        Ok(rows)
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        change: StatusChange,
    ) -> Result<Appointment, BookingStoreError> {
        let path = format!("{}?id=eq.{}&status=eq.{}", APPOINTMENTS, id, expected);
        let rows: Vec<Appointment> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                self.supabase.service_token(),
                Some(serde_json::to_value(&change)?),
                Some(SupabaseClient::return_representation()),
            )
            .await?;

        if let Some(updated) = rows.into_iter().next() {
            return Ok(updated);
        }

        // Nothing matched: either the row is gone or its status moved on.
        match self.get(id).await? {
            None => Err(BookingStoreError::NotFound(id)),
            Some(current) => {
                Err(BookingStoreError::StatusMismatch { expected, actual: current.status })
            }
        }
    }
}
