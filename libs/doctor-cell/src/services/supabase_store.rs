use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{SupabaseClient, SupabaseError};

use crate::error::ScheduleError;
use crate::models::{
    AvailabilityOverride, DateSchedule, Doctor, DoctorCalendar, Leave, LeaveStatus,
    RecurringSchedule, ScheduleKind,
};
use crate::services::store::{DoctorDirectory, ScheduleStore};

const DOCTORS: &str = "/rest/v1/doctors";
const RECURRING: &str = "/rest/v1/recurring_schedules";
const DATED: &str = "/rest/v1/date_schedules";
const OVERRIDES: &str = "/rest/v1/availability_overrides";
const LEAVES: &str = "/rest/v1/doctor_leaves";

fn table(kind: ScheduleKind) -> &'static str {
    match kind {
        ScheduleKind::Recurring => RECURRING,
        ScheduleKind::Dated => DATED,
        ScheduleKind::Override => OVERRIDES,
        ScheduleKind::Leave => LEAVES,
    }
}

/// Schedule store backed by PostgREST tables.
///
/// `availability_overrides` is expected to carry a unique index on
/// `(doctor_id, date, coalesce(hospital_id, '00000000-0000-0000-0000-000000000000'))`
/// so that a duplicate override surfaces as a 409.
pub struct SupabaseScheduleStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseScheduleStore {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)))
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn select<T: DeserializeOwned>(&self, path: String) -> Result<Vec<T>, ScheduleError> {
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, self.supabase.service_token(), None)
            .await?;

        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(ScheduleError::from))
            .collect()
    }

    async fn insert<T: Serialize + DeserializeOwned>(
        &self,
        table: &str,
        record: &T,
    ) -> Result<T, ScheduleError> {
        let rows: Vec<T> = self
            .supabase
            .request_with_headers(
                Method::POST,
                table,
                self.supabase.service_token(),
                Some(serde_json::to_value(record)?),
                Some(SupabaseClient::return_representation()),
            )
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| {
                ScheduleError::Storage(format!("Insert into {} returned no rows", table))
            })
    }
}

#[async_trait]
impl DoctorDirectory for SupabaseScheduleStore {
    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, ScheduleError> {
        let path = format!(
            "{}?id=eq.{}&select=id,full_name,department_id,\
             appointment_duration_minutes,break_time_minutes,hospitals",
            DOCTORS, doctor_id
        );
        let doctors: Vec<Doctor> = self.select(path).await?;
        Ok(doctors.into_iter().next())
    }
}

#[async_trait]
impl ScheduleStore for SupabaseScheduleStore {
    async fn load_calendar(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<DoctorCalendar, ScheduleError> {
        debug!("Loading calendar for doctor {} from {} to {}", doctor_id, from, to);

        let (recurring, date_schedules, overrides, leaves) = futures::try_join!(
            self.select::<RecurringSchedule>(format!(
                "{}?doctor_id=eq.{}&order=start_time.asc",
                RECURRING, doctor_id
            )),
            self.select::<DateSchedule>(format!(
                "{}?doctor_id=eq.{}&date=gte.{}&date=lte.{}&order=date.asc,start_time.asc",
                DATED, doctor_id, from, to
            )),
            self.select::<AvailabilityOverride>(format!(
                "{}?doctor_id=eq.{}&date=gte.{}&date=lte.{}",
                OVERRIDES, doctor_id, from, to
            )),
            self.select::<Leave>(format!(
                "{}?doctor_id=eq.{}&start_date=lte.{}&end_date=gte.{}",
                LEAVES, doctor_id, to, from
            )),
        )?;

        Ok(DoctorCalendar { doctor_id, recurring, date_schedules, overrides, leaves })
    }

    async fn insert_recurring(
        &self,
        schedule: RecurringSchedule,
    ) -> Result<RecurringSchedule, ScheduleError> {
        let created = self.insert(RECURRING, &schedule).await?;
        info!("Recurring schedule {} created for doctor {}", created.id, created.doctor_id);
        Ok(created)
    }

    async fn insert_date_schedule(
        &self,
        schedule: DateSchedule,
    ) -> Result<DateSchedule, ScheduleError> {
        let created = self.insert(DATED, &schedule).await?;
        info!("Date schedule {} created for doctor {}", created.id, created.doctor_id);
        Ok(created)
    }

    async fn insert_override(
        &self,
        entry: AvailabilityOverride,
    ) -> Result<AvailabilityOverride, ScheduleError> {
        let rows: Vec<AvailabilityOverride> = self
            .supabase
            .request_with_headers(
                Method::POST,
                OVERRIDES,
                self.supabase.service_token(),
                Some(serde_json::to_value(&entry)?),
                Some(SupabaseClient::return_representation()),
            )
            .await
            .map_err(|e| match e {
                SupabaseError::Conflict(_) => ScheduleError::DuplicateOverride(entry.date),
                other => ScheduleError::from(other),
            })?;

        let created = rows
            .into_iter()
            .next()
            .ok_or_else(|| ScheduleError::Storage("Override insert returned no rows".to_string()))?;
        info!("Availability override {} created for {}", created.id, created.date);
        Ok(created)
    }

    async fn insert_leave(&self, leave: Leave) -> Result<Leave, ScheduleError> {
        self.insert(LEAVES, &leave).await
    }

    async fn update_leave_status(
        &self,
        doctor_id: Uuid,
        leave_id: Uuid,
        status: LeaveStatus,
    ) -> Result<Leave, ScheduleError> {
        let path = format!("{}?id=eq.{}&doctor_id=eq.{}", LEAVES, leave_id, doctor_id);
        let rows: Vec<Leave> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                self.supabase.service_token(),
                Some(json!({ "status": status })),
                Some(SupabaseClient::return_representation()),
            )
            .await?;

        rows.into_iter()
            .next()
            .ok_or(ScheduleError::EntryNotFound { kind: ScheduleKind::Leave, id: leave_id })
    }

    async fn delete(
        &self,
        doctor_id: Uuid,
        kind: ScheduleKind,
        id: Uuid,
    ) -> Result<(), ScheduleError> {
        let path = format!("{}?id=eq.{}&doctor_id=eq.{}", table(kind), id, doctor_id);
        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::DELETE,
                &path,
                self.supabase.service_token(),
                None,
                Some(SupabaseClient::return_representation()),
            )
            .await?;

        if rows.is_empty() {
            return Err(ScheduleError::EntryNotFound { kind, id });
        }
        Ok(())
    }
}
