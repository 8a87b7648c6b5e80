// libs/scheduling-cell/src/services/appointments.rs
//
// Read-only view over the appointments collaborator. The scheduling core
// never writes appointments; booking itself lives behind the external
// appointment-creation boundary and its (doctor_id, scheduled_at)
// uniqueness constraint.

use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Appointment, AppointmentStatus, ScheduleError};

pub struct AppointmentLookup {
    supabase: SupabaseClient,
}

impl AppointmentLookup {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Appointments for one calendar day, optionally restricted to a status
    /// set (e.g. the occupying statuses when resolving availability).
    pub async fn find_for_date(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        statuses: Option<&[AppointmentStatus]>,
        auth_token: Option<&str>,
    ) -> Result<Vec<Appointment>, ScheduleError> {
        let start_of_day = date.and_hms_opt(0, 0, 0).unwrap().and_utc();
        let end_of_day = date.and_hms_opt(23, 59, 59).unwrap().and_utc();

        self.find_in_range(doctor_id, start_of_day, end_of_day, statuses, auth_token).await
    }

    pub async fn find_in_range(
        &self,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        statuses: Option<&[AppointmentStatus]>,
        auth_token: Option<&str>,
    ) -> Result<Vec<Appointment>, ScheduleError> {
        debug!("Fetching appointments for doctor {} from {} to {}", doctor_id, from, to);

        let mut query_parts = vec![
            format!("doctor_id=eq.{}", doctor_id),
            format!("scheduled_at=gte.{}", from.to_rfc3339()),
            format!("scheduled_at=lte.{}", to.to_rfc3339()),
        ];

        if let Some(statuses) = statuses {
            query_parts.push(format!("status=in.({})", status_list(statuses)));
        }

        let path = format!(
            "/rest/v1/appointments?{}&order=scheduled_at.asc",
            query_parts.join("&")
        );

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await?;

        decode_appointments(result)
    }

    /// Earliest future appointment that still reserves its slot.
    pub async fn next_upcoming(
        &self,
        doctor_id: Uuid,
        after: DateTime<Utc>,
        auth_token: Option<&str>,
    ) -> Result<Option<Appointment>, ScheduleError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&scheduled_at=gt.{}&status=in.({})&order=scheduled_at.asc&limit=1",
            doctor_id,
            after.to_rfc3339(),
            status_list(AppointmentStatus::occupying()),
        );

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await?;

        Ok(decode_appointments(result)?.into_iter().next())
    }

    /// Most recent completed appointments, newest first.
    pub async fn recently_completed(
        &self,
        doctor_id: Uuid,
        limit: usize,
        auth_token: Option<&str>,
    ) -> Result<Vec<Appointment>, ScheduleError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&status=eq.completed&order=scheduled_at.desc&limit={}",
            doctor_id,
            limit,
        );

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await?;

        decode_appointments(result)
    }
}

fn status_list(statuses: &[AppointmentStatus]) -> String {
    statuses
        .iter()
        .map(|status| status.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

fn decode_appointments(values: Vec<Value>) -> Result<Vec<Appointment>, ScheduleError> {
    values
        .into_iter()
        .map(|value| serde_json::from_value(value).map_err(|e| ScheduleError::Storage(e.into())))
        .collect()
}
