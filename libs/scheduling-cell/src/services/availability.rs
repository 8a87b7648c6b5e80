// libs/scheduling-cell/src/services/availability.rs

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_config::{AppConfig, SchedulingConfig};
use shared_database::supabase::SupabaseClient;

use crate::clock::{Clock, SystemClock};
use crate::models::{
    Appointment, AppointmentStatus, AvailableSlot, BlockedDate, DayAvailability,
    Location, ScheduleError, SlotDefinition, Weekday,
};
use crate::services::appointments::AppointmentLookup;
use crate::services::slots::generate_slot_times;

pub struct AvailabilityService {
    supabase: SupabaseClient,
    appointments: AppointmentLookup,
    scheduling: SchedulingConfig,
    clock: Arc<dyn Clock>,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &AppConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            appointments: AppointmentLookup::new(config),
            scheduling: config.scheduling.clone(),
            clock,
        }
    }

    /// Resolve the bookable slots for one calendar date.
    ///
    /// An active blocked date short-circuits everything else; otherwise the
    /// union of recurring definitions for the weekday and specific
    /// definitions for the date is expanded through the slot generator,
    /// already-booked start times are removed, and same-day slots inside the
    /// minimum lead time are dropped. A doctor with nothing configured gets
    /// an empty list, not an error.
    pub async fn get_available_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<DayAvailability, ScheduleError> {
        debug!("Resolving available slots for doctor {} on {}", doctor_id, date);

        if let Some(blocked) = self.find_blocked_date(doctor_id, date, auth_token).await? {
            debug!("Doctor {} has {} blocked: {:?}", doctor_id, date, blocked.reason);
            return Ok(DayAvailability::blocked(date, blocked.reason));
        }

        let definitions = self.definitions_for_date(doctor_id, date, auth_token).await?;
        if definitions.is_empty() {
            return Ok(DayAvailability::open(date, Vec::new()));
        }

        let booked = self.appointments.find_for_date(
            doctor_id,
            date,
            Some(AppointmentStatus::occupying()),
            auth_token,
        ).await?;
        let occupied = occupied_times(&booked);

        let locations = self.locations_by_id(doctor_id, &definitions, auth_token).await?;

        let now = self.clock.now();
        let mut slots = Vec::new();

        for definition in &definitions {
            let lunch = lunch_for_window(
                definition.start_time,
                definition.end_time,
                &self.scheduling,
            );

            let times = generate_slot_times(
                definition.start_time,
                definition.end_time,
                self.scheduling.slot_duration_minutes,
                lunch,
            );

            for time in times {
                if occupied.contains(&time) {
                    continue;
                }
                if !clears_lead_time(date, &time, now, self.scheduling.min_lead_time_minutes) {
                    continue;
                }

                slots.push(AvailableSlot {
                    time,
                    location_id: definition.location_id,
                    location: definition
                        .location_id
                        .and_then(|id| locations.get(&id).cloned()),
                });
            }
        }

        debug!("Found {} available slots for doctor {} on {}", slots.len(), doctor_id, date);
        Ok(DayAvailability::open(date, slots))
    }

    async fn find_blocked_date(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<Option<BlockedDate>, ScheduleError> {
        let path = format!(
            "/rest/v1/blocked_dates?doctor_id=eq.{}&date=eq.{}&active=is.true",
            doctor_id, date
        );

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await?;

        result
            .into_iter()
            .next()
            .map(|value| serde_json::from_value(value).map_err(|e| ScheduleError::Storage(e.into())))
            .transpose()
    }

    /// Union of recurring definitions for the date's weekday and specific
    /// definitions for the date itself, ordered by start time.
    async fn definitions_for_date(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<Vec<SlotDefinition>, ScheduleError> {
        let weekday = Weekday::from(chrono::Datelike::weekday(&date));

        let path = format!(
            "/rest/v1/slot_definitions?doctor_id=eq.{}&active=is.true&deleted_at=is.null\
             &or=(and(kind.eq.recurring,day_of_week.eq.{}),and(kind.eq.specific,specific_date.eq.{}))\
             &order=start_time.asc",
            doctor_id, weekday, date
        );

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await?;

        result
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(|e| ScheduleError::Storage(e.into())))
            .collect()
    }

    async fn locations_by_id(
        &self,
        doctor_id: Uuid,
        definitions: &[SlotDefinition],
        auth_token: Option<&str>,
    ) -> Result<HashMap<Uuid, Location>, ScheduleError> {
        let mut ids: Vec<Uuid> = definitions
            .iter()
            .filter_map(|definition| definition.location_id)
            .collect();
        ids.sort();
        ids.dedup();

        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let id_list = ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let path = format!(
            "/rest/v1/locations?doctor_id=eq.{}&id=in.({})&active=is.true",
            doctor_id, id_list
        );

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await?;

        let mut locations = HashMap::new();
        for value in result {
            let location: Location = serde_json::from_value(value)
                .map_err(|e| ScheduleError::Storage(e.into()))?;
            locations.insert(location.id, location);
        }

        Ok(locations)
    }
}

/// Start times already taken by appointments that still reserve their slot.
fn occupied_times(appointments: &[Appointment]) -> HashSet<String> {
    appointments
        .iter()
        .filter(|appointment| appointment.status.is_occupying())
        .map(|appointment| appointment.scheduled_at.format("%H:%M").to_string())
        .collect()
}

/// The lunch break only carves out a window that fully spans it. A morning
/// window ending at or before the break, or an afternoon window starting
/// inside it, is offered exactly as the doctor configured it.
fn lunch_for_window(
    start: NaiveTime,
    end: NaiveTime,
    scheduling: &SchedulingConfig,
) -> Option<(NaiveTime, NaiveTime)> {
    if start <= scheduling.lunch_break_start && end >= scheduling.lunch_break_end {
        Some((scheduling.lunch_break_start, scheduling.lunch_break_end))
    } else {
        None
    }
}

/// Same-day slots must start strictly after `now + lead_minutes`; any other
/// date always clears.
fn clears_lead_time(
    date: NaiveDate,
    time: &str,
    now: DateTime<Utc>,
    lead_minutes: i64,
) -> bool {
    if date != now.date_naive() {
        return true;
    }

    let Ok(slot_time) = NaiveTime::parse_from_str(time, "%H:%M") else {
        return false;
    };

    let slot_start = date.and_time(slot_time).and_utc();
    slot_start > now + Duration::minutes(lead_minutes)
}
